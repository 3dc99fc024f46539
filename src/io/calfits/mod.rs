// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Code to read and write calfits files.

Every data HDU uses the same six axes (in FITS order): `Narrays` (the values
stored per solution), `JONES`, `TIME`, `FREQS`, `IF` (spectral windows) and
`ANTAXIS`. Axis values are described by `CTYPEn`, `CUNITn`, `CRVALn`,
`CDELTn` and `CRPIXn`, so times, frequencies and Jones terms must be evenly
spaced unless they are also stored in a table.

HDUs:
- primary: gain solutions as `[real, imag, flag, quality]`, or delay solutions
  as `[delay, quality]` (with a `FREQS` axis of length 1);
- `ANTENNAS`: antenna names, numbers, the antennas with solutions (padded with
  -1), and optionally positions and diameters;
- `FLAGS`: delay flags;
- `INFLAGS` (optional): input flags;
- `TOTQLTY` (optional): total quality, without the `Narrays` or `ANTAXIS`
  axes;
- `SPWS` (more than one spectral window): window numbers and frequency ranges;
- `FREQS` (flexible spectral windows): per-channel frequencies, widths and
  windows.

Future-shaped arrays are written with the axes that legacy shapes would have.
 */

mod error;
mod read;
mod write;

pub use error::{CalfitsReadError, CalfitsWriteError};
pub(crate) use read::read;
pub(crate) use write::write;

use crate::{
    constants::{VERSION_LINE, VERSION_STRING},
    uvcal::{CheckOptions, ShapeConvention},
};

#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// The array shapes the returned object uses. Wide-band files can only be
    /// read with [`ShapeConvention::Future`].
    pub shapes: ShapeConvention,

    /// Check the object after reading it.
    pub run_check: bool,
    pub check: CheckOptions,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            shapes: ShapeConvention::default(),
            run_check: true,
            check: CheckOptions::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Overwrite an existing file.
    pub clobber: bool,

    /// Check the object before writing it.
    pub run_check: bool,
    pub check: CheckOptions,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            clobber: false,
            run_check: true,
            check: CheckOptions::default(),
        }
    }
}

const ANTENNAS_HDU: &str = "ANTENNAS";
const FLAGS_HDU: &str = "FLAGS";
const INPUT_FLAGS_HDU: &str = "INFLAGS";
const TOTAL_QUALITY_HDU: &str = "TOTQLTY";
const SPWS_HDU: &str = "SPWS";
const FREQS_HDU: &str = "FREQS";

// FITS axis numbers of the data HDUs.
const JONES_AXIS: usize = 2;
const TIME_AXIS: usize = 3;
const FREQ_AXIS: usize = 4;
const SPW_AXIS: usize = 5;
const ANT_AXIS: usize = 6;

/// Primary header keywords that this codec reads and writes itself; anything
/// else in the primary header is an extra keyword.
const KNOWN_KEYS: &[&str] = &[
    "CALTYPE", "CALSTYLE", "GNCONV", "XORIENT", "TELESCOP", "INTTIME", "CHWIDTH", "NSPWS",
    "NFREQS", "FLEXSPW", "WIDEBAND", "FRQRANGE", "TMERANGE", "ARRAYX", "ARRAYY", "ARRAYZ",
    "OBSERVER", "GITORIG", "GITHASH", "REFANT", "CATALOG", "FIELD", "HISTORY", "COMMENT",
];

/// Structural FITS keywords.
const RESERVED_KEYS: &[&str] = &[
    "SIMPLE", "XTENSION", "BITPIX", "EXTEND", "EXTNAME", "PCOUNT", "GCOUNT", "TFIELDS",
    "BSCALE", "BZERO", "CONTINUE", "LONGSTRN", "END",
];

/// Comment cards that cfitsio adds to every primary header.
const CFITSIO_COMMENTS: &[&str] = &[
    "FITS (Flexible Image Transport System) format is defined in 'Astronomy",
    "and Astrophysics', volume 376, page 359; bibcode: 2001A&A...376..359H",
];

/// Per-axis keyword prefixes; followed by the axis number.
const AXIS_KEY_PREFIXES: &[&str] = &["NAXIS", "CTYPE", "CUNIT", "CRVAL", "CDELT", "CRPIX"];

fn is_reserved_key(name: &str) -> bool {
    name.is_empty()
        || RESERVED_KEYS.contains(&name)
        || KNOWN_KEYS.contains(&name)
        || AXIS_KEY_PREFIXES.iter().any(|prefix| {
            name.strip_prefix(prefix)
                .map_or(false, |n| n.is_empty() || n.parse::<u8>().is_ok())
        })
}

/// The history, with the library version appended if it isn't already there.
/// The version always starts on its own line.
fn history_with_version(history: &str) -> (String, bool) {
    if history.contains(VERSION_LINE.as_str()) {
        return (history.to_string(), false);
    }
    let mut history = history.to_string();
    if !history.is_empty() && !history.ends_with('\n') {
        history.push('\n');
    }
    history.push_str(&VERSION_STRING);
    (history, true)
}
