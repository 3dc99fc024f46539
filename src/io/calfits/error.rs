// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reading or writing calfits files.

use thiserror::Error;

use crate::{io::fits::FitsError, telescopes::TelescopeError, uvcal::CheckError};

#[derive(Error, Debug)]
pub enum CalfitsReadError {
    #[error("CALTYPE must be 'gain' or 'delay', got '{0}'")]
    UnknownCalType(String),

    #[error("Couldn't interpret {key} = '{value}'")]
    BadValue { key: &'static str, value: String },

    #[error("This file contains a wide-band calibration, which can only be read with future array shapes")]
    WideBandNeedsFuture,

    #[error("The {0} HDU is required but wasn't found")]
    MissingHdu(&'static str),

    #[error("The {hdu} HDU is malformed: {reason}")]
    BadShape { hdu: &'static str, reason: String },

    #[error("{hdu} HDU keyword {key} doesn't match the primary HDU")]
    HeaderMismatch { hdu: &'static str, key: String },

    #[error("freq_range is required for wide-band calibrations, but neither FRQRANGE nor SPWS FRQLOW/FRQHIGH were found")]
    MissingFreqRange,

    #[error(transparent)]
    Fits(#[from] FitsError),

    #[error(transparent)]
    Check(#[from] CheckError),

    #[error(transparent)]
    Telescope(#[from] TelescopeError),
}

#[derive(Error, Debug)]
pub enum CalfitsWriteError {
    #[error("cal_type is unknown; set it to 'gain' or 'delay' before writing")]
    UnknownCalType,

    #[error("Extra keyword {key} is of a type that cannot be written to calfits (lists and dicts aren't supported)")]
    ExtraKeywordType { key: String },

    #[error("The times are not evenly spaced. This is not supported by the calfits format")]
    UnevenTimes,

    #[error("The frequencies are not evenly spaced (probably because of a select operation). The calfits format does not support unevenly spaced frequencies")]
    UnevenFreqs,

    #[error("The channel widths are not all the same. The calfits format only supports this with flexible spectral windows")]
    NonUniformChannelWidth,

    #[error("The jones values are not evenly spaced. The calibration fits file format does not support unevenly spaced polarizations")]
    UnevenJones,

    #[error("{0} is empty")]
    EmptyAxis(&'static str),

    #[error("ant_array has {nants_data} antennas, but there are only {nants_telescope} antennas in the telescope")]
    AntArrayTooLong {
        nants_data: usize,
        nants_telescope: usize,
    },

    #[error("{name} has shape {actual:?}, but {expected:?} was expected")]
    MismatchedShape {
        name: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("File {0} already exists; set clobber to overwrite it")]
    FileExists(String),

    #[error(transparent)]
    Check(#[from] CheckError),

    #[error(transparent)]
    Fits(#[from] FitsError),

    #[error(transparent)]
    Fitsio(#[from] fitsio::errors::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
