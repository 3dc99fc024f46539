// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Calibration solutions for radio interferometers.

[`UVCal`] holds per-antenna gain or delay solutions over spectral windows,
frequencies, times and Jones terms, keeps the shapes of all of its arrays
consistent with its dimension counts, and reads and writes the multi-HDU
"calfits" FITS format.
 */

pub mod constants;
mod error;
pub mod initializers;
pub mod io;
pub mod jones;
pub mod telescopes;
pub mod uvcal;

#[cfg(test)]
mod tests;

// Build-time information from the "built" crate.
pub(crate) mod built_info {
    #![allow(dead_code)]
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

// Re-exports.
pub use error::UvcalError;
pub use initializers::{new_uvcal, new_uvcal_from_vis, InitError, NewUvcalArgs, VisMetadata};
pub use io::calfits::{CalfitsReadError, CalfitsWriteError, ReadOptions, WriteOptions};
pub use uvcal::{
    params::{AxisDim, DType, ParamDescriptor, Presence, Tier, Tolerance, PARAMETERS},
    CalStyle, CalType, ChannelFreqs, CheckError, CheckOptions, EqOptions, ExtraKeyword, FreqInfo,
    GainConvention, SelectError, Selection, ShapeConvention, UVCal, UvcalWarning, XOrientation,
};

// External re-exports.
pub use num_complex::Complex64 as c64;
