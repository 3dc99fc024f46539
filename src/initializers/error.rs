// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with building new calibration objects.

use thiserror::Error;

use crate::{telescopes::TelescopeError, uvcal::CheckError};

#[derive(Error, Debug)]
pub enum InitError {
    #[error("{0} must be provided")]
    MissingArgument(&'static str),

    #[error("Provide *either* freq_range *or* freq_array (and optionally channel_width), not both")]
    BothFreqs,

    #[error("You must provide either freq_array (optionally along with channel_width) or freq_range")]
    NoFreqs,

    #[error("cal_type must be either 'gain' or 'delay', got '{0}'")]
    BadCalType(String),

    #[error("cal_style must be 'redundant' or 'sky', got '{0}'")]
    BadCalStyle(String),

    #[error("If cal_style is 'sky', ref_antenna_name, sky_catalog and sky_field must all be provided")]
    SkyFields,

    #[error("gain_convention must be 'multiply' or 'divide', got '{0}'")]
    BadGainConvention(String),

    #[error("x_orientation must be 'east' or 'north', got '{0}'")]
    BadXOrientation(String),

    #[error("Couldn't interpret jones_array {0}; use 'linear', 'circular', Jones codes or Jones names")]
    BadJones(String),

    #[error("The following ants are not in antenna_numbers: {0:?}")]
    AntsNotInTelescope(Vec<i32>),

    #[error("antenna_names has {names} entries, but antenna_positions has {positions}")]
    AntennaNamesLength { names: usize, positions: usize },

    #[error("{name} has {got} entries, but {expected} were expected")]
    BadLength {
        name: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("channel_width must be provided when freq_array has fewer than two channels")]
    NoChannelWidth,

    #[error("integration_time must be provided when time_array has fewer than two times")]
    NoIntegrationTime,

    #[error("Wide-band calibrations (from freq_range) can't use legacy array shapes")]
    WideBandLegacyShapes,

    #[error("{0}")]
    ArgFile(String),

    #[error(transparent)]
    Check(#[from] CheckError),

    #[error(transparent)]
    Telescope(#[from] TelescopeError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
