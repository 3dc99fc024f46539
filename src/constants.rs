// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All floating-point constants are double precision; frequencies are in Hz,
times are Julian dates and durations are in seconds unless stated otherwise.
 */

use lazy_static::lazy_static;

use crate::built_info;

/// The number of seconds in a day.
pub const SECONDS_PER_DAY: f64 = 86400.0;

/// The default relative and absolute tolerances used when comparing
/// floating-point parameters.
pub const DEFAULT_RTOL: f64 = 1e-5;
pub const DEFAULT_ATOL: f64 = 1e-8;

/// Frequencies compare equal within a millihertz.
pub const FREQ_ATOL: f64 = 1e-3;

/// Times compare equal within a millisecond (expressed in days).
pub const TIME_ATOL: f64 = 1e-3 / SECONDS_PER_DAY;

/// Positions and diameters compare equal within a millimetre.
pub const POSITION_ATOL: f64 = 1e-3;

/// Relative tolerance used when testing whether frequencies or times are
/// evenly spaced.
pub const SPACING_RTOL: f64 = 1e-5;

/// The longest keyword that doesn't need the FITS HIERARCH convention.
pub const MAX_FITS_KEY_LEN: usize = 8;

/// The number of characters of a COMMENT or HISTORY card used for text before
/// a line is continued onto the next card. A continued card holds exactly this
/// many characters followed by '&'.
pub const TEXT_CARD_CHUNK_LEN: usize = 70;

lazy_static! {
    /// The line recorded in every history written or read by this library.
    pub static ref VERSION_LINE: String = format!(
        "Read/written with {} version: {}.",
        built_info::PKG_NAME,
        built_info::PKG_VERSION
    );

    /// [`VERSION_LINE`], followed by the git hash of the build on its own
    /// line (if available).
    pub static ref VERSION_STRING: String = match built_info::GIT_COMMIT_HASH {
        Some(hash) => format!("{}\nGit hash: {hash}.", *VERSION_LINE),
        None => VERSION_LINE.clone(),
    };
}
