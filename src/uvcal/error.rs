// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with checking and selecting calibration solutions.

use thiserror::Error;

use super::params::DType;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("{name} is a required parameter but it is not set")]
    Missing { name: &'static str },

    #[error("{name} is set, but it must not be set {reason}")]
    Forbidden { name: &'static str, reason: &'static str },

    #[error("{name} ({dtype}) has shape {actual:?}, but its expected shape is {expected:?}")]
    BadShape {
        name: &'static str,
        dtype: DType,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("{name} ({dtype}) has an unacceptable value: {reason}")]
    Unacceptable {
        name: &'static str,
        dtype: DType,
        reason: String,
    },

    #[error("The following ants are not in antenna_numbers: {ants:?}")]
    AntsNotInTelescope { ants: Vec<i32> },

    #[error("All values in the flex_spw_id_array must exist in the spw_array; missing {ids:?}")]
    FlexSpwIdsNotInSpwArray { ids: Vec<i32> },

    #[error("The channels of spectral window {spw} are not grouped together in flex_spw_id_array")]
    FlexSpwNotGrouped { spw: i32 },

    #[error("Flexible spectral windows need per-channel frequencies, but this object is wide-band")]
    FlexSpwNeedsChannels,

    #[error("The frequencies of spectral window {spw} are not strictly increasing")]
    FreqsNotIncreasing { spw: i32 },

    #[error("The frequencies of spectral window {spw} are not evenly spaced")]
    UnevenFreqs { spw: i32 },

    #[error("Wide-band calibrations require future array shapes")]
    WideBandNeedsFutureShapes,

    #[error("Delay-type calibrations with future array shapes must be wide-band")]
    DelayNeedsWideBand,

    #[error("nfreqs must be 1 for wide-band calibrations, but it is {nfreqs}")]
    WideBandNfreqs { nfreqs: usize },

    #[error("Per-channel solutions only allow one spectral window unless flexible spectral windows are in use, but nspws is {nspws}")]
    MultipleSpwsNeedFlex { nspws: usize },

    #[error("Couldn't convert array shapes: {0}")]
    ShapeConversion(&'static str),
}

#[derive(Error, Debug)]
pub enum SelectError {
    #[error("Only one of antenna_nums and antenna_names can be provided")]
    AntennaNumsAndNames,

    #[error("Antenna names {0:?} are not present in antenna_names")]
    UnknownAntennaNames(Vec<String>),

    #[error("{axis} values {values} are not present on the object")]
    NotPresent { axis: &'static str, values: String },

    #[error("Channel indices {0:?} are out of range")]
    BadChannelIndices(Vec<usize>),

    #[error("Selection leaves no {0}")]
    Empty(&'static str),

    #[error("Frequencies can't be selected from a wide-band calibration; select spectral windows instead")]
    WideBandFreqs,

    #[error(transparent)]
    Check(#[from] CheckError),
}
