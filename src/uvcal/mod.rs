// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The calibration-solutions container.

A [`UVCal`] stores its dimension counts explicitly; every array it holds must
be shaped according to its entry in [`params::PARAMETERS`], which describes
each axis in terms of those counts. [`UVCal::check`] enforces this.
 */

mod check;
mod error;
pub mod params;
mod select;
mod shapes;
#[cfg(test)]
mod tests;
mod warning;

pub use check::CheckOptions;
pub use error::{CheckError, SelectError};
pub use select::Selection;
pub use warning::UvcalWarning;
pub(crate) use warning::push_warning;

use std::path::Path;

use indexmap::IndexMap;
use log::debug;
use ndarray::{Array2, ArrayD};
use num_complex::Complex64 as c64;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    io::calfits::{self, ReadOptions, WriteOptions},
    telescopes::{known_telescope, TelescopeError},
    UvcalError,
};
use params::{AxisDim, Tier, Tolerance, PARAMETERS};

#[derive(Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq, Default)]
#[strum(serialize_all = "snake_case")]
pub enum CalType {
    Gain,
    Delay,

    /// Not yet known; such an object cannot be checked or written.
    #[default]
    Unknown,
}

#[derive(Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum CalStyle {
    Redundant,
    Sky,
}

/// Whether data are multiplied or divided by the gains to calibrate them.
#[derive(Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum GainConvention {
    Multiply,
    Divide,
}

/// The physical direction of the x dipoles.
#[derive(Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum XOrientation {
    #[strum(to_string = "east", serialize = "e")]
    East,
    #[strum(to_string = "north", serialize = "n")]
    North,
}

/// Which set of array shapes is in use. "Legacy" shapes carry a
/// spectral-window axis (of length 1 with flexible spectral windows) ahead of
/// the frequency axis; "future" shapes don't.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShapeConvention {
    #[default]
    Legacy,
    Future,
}

/// Per-channel frequency metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelFreqs {
    /// Channel centres \[Hz\].
    pub freq_array: Vec<f64>,

    /// \[Hz\]
    pub channel_width: Vec<f64>,

    /// The spectral window of each channel. Only set with flexible spectral
    /// windows.
    pub flex_spw_id_array: Option<Vec<i32>>,

    /// The (low, high) frequency of each spectral window \[Hz\].
    pub freq_range: Option<Array2<f64>>,
}

/// How frequencies are described.
#[derive(Debug, Clone, PartialEq)]
pub enum FreqInfo {
    Channels(ChannelFreqs),

    /// Solutions are per spectral window; there are no channels.
    WideBand {
        /// Shape (nspws, 2).
        freq_range: Array2<f64>,
    },
}

impl Default for FreqInfo {
    fn default() -> Self {
        FreqInfo::Channels(ChannelFreqs::default())
    }
}

impl FreqInfo {
    pub fn channels(&self) -> Option<&ChannelFreqs> {
        match self {
            FreqInfo::Channels(c) => Some(c),
            FreqInfo::WideBand { .. } => None,
        }
    }

    pub fn freq_array(&self) -> Option<&[f64]> {
        self.channels().map(|c| c.freq_array.as_slice())
    }

    pub fn channel_width(&self) -> Option<&[f64]> {
        self.channels().map(|c| c.channel_width.as_slice())
    }

    pub fn flex_spw_id_array(&self) -> Option<&[i32]> {
        self.channels().and_then(|c| c.flex_spw_id_array.as_deref())
    }

    pub fn freq_range(&self) -> Option<&Array2<f64>> {
        match self {
            FreqInfo::Channels(c) => c.freq_range.as_ref(),
            FreqInfo::WideBand { freq_range } => Some(freq_range),
        }
    }
}

/// A scalar value attached to the object as a FITS header keyword.
/// Containers can be held, but they cannot be written to calfits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraKeyword {
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(c64),
    Str(String),
    List(Vec<ExtraKeyword>),
    Map(IndexMap<String, ExtraKeyword>),
}

impl ExtraKeyword {
    pub fn is_container(&self) -> bool {
        matches!(self, ExtraKeyword::List(_) | ExtraKeyword::Map(_))
    }
}

#[derive(Debug, Clone)]
pub struct EqOptions {
    /// Also compare optional parameters.
    pub check_extra: bool,

    /// Parameters whose differences are ignored.
    pub allowed_failures: Vec<&'static str>,

    /// Compare floating-point values with this tolerance instead of each
    /// parameter's own.
    pub tolerance: Option<Tolerance>,
}

impl Default for EqOptions {
    fn default() -> Self {
        Self {
            check_extra: true,
            allowed_failures: vec!["history"],
            tolerance: None,
        }
    }
}

/// Calibration solutions.
#[derive(Debug, Clone, Default)]
pub struct UVCal {
    pub nants_data: usize,
    pub nants_telescope: usize,
    pub nspws: usize,
    pub nfreqs: usize,
    pub ntimes: usize,
    pub njones: usize,

    pub cal_type: CalType,
    pub cal_style: Option<CalStyle>,
    pub ref_antenna_name: Option<String>,
    pub sky_catalog: Option<String>,
    pub sky_field: Option<String>,
    pub gain_convention: Option<GainConvention>,
    pub x_orientation: Option<XOrientation>,

    pub telescope_name: Option<String>,
    /// Earth-centred, Earth-fixed \[metres\].
    pub telescope_location: Option<[f64; 3]>,
    pub antenna_names: Vec<String>,
    pub antenna_numbers: Vec<i32>,
    /// Relative to the telescope location, shape (nants_telescope, 3)
    /// \[metres\].
    pub antenna_positions: Option<Array2<f64>>,
    pub antenna_diameters: Option<Vec<f64>>,
    /// The antennas that have solutions.
    pub ant_array: Vec<i32>,

    pub spw_array: Vec<i32>,
    pub freq_info: FreqInfo,
    /// Julian dates.
    pub time_array: Vec<f64>,
    /// \[seconds\]
    pub integration_time: Option<f64>,
    pub time_range: Option<[f64; 2]>,
    pub jones_array: Vec<i32>,

    pub gain_array: Option<ArrayD<c64>>,
    /// \[seconds\]
    pub delay_array: Option<ArrayD<f64>>,
    pub flag_array: Option<ArrayD<bool>>,
    pub quality_array: Option<ArrayD<f64>>,
    pub total_quality_array: Option<ArrayD<f64>>,
    /// Deprecated.
    pub input_flag_array: Option<ArrayD<bool>>,

    pub shapes: ShapeConvention,

    pub history: String,
    pub observer: Option<String>,
    pub git_origin_cal: Option<String>,
    pub git_hash_cal: Option<String>,
    pub extra_keywords: IndexMap<String, ExtraKeyword>,
}

impl PartialEq for UVCal {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, &EqOptions::default())
    }
}

impl UVCal {
    /// An object with no metadata or data. It won't pass [`UVCal::check`]
    /// until it's filled in.
    pub fn new() -> UVCal {
        UVCal::default()
    }

    pub fn copy(&self) -> UVCal {
        self.clone()
    }

    pub fn is_flex_spw(&self) -> bool {
        self.freq_info.flex_spw_id_array().is_some()
    }

    pub fn is_wide_band(&self) -> bool {
        matches!(self.freq_info, FreqInfo::WideBand { .. })
    }

    /// The expected shape of a parameter, given the current counts and modes.
    /// `None` if the parameter isn't known, is a scalar or doesn't apply.
    pub fn expected_shape(&self, name: &str) -> Option<Vec<usize>> {
        PARAMETERS
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.expected_shape(self))
    }

    pub(crate) fn axis_len(&self, dim: AxisDim) -> usize {
        match dim {
            AxisDim::NantsData => self.nants_data,
            AxisDim::NantsTelescope => self.nants_telescope,
            AxisDim::Nspws => self.nspws,
            AxisDim::Nfreqs => self.nfreqs,
            AxisDim::Ntimes => self.ntimes,
            AxisDim::Njones => self.njones,
            AxisDim::Fixed(n) => n,
        }
    }

    /// The axes of a per-antenna array. `per_channel` is false for delays and
    /// their qualities, which have a frequency axis of length 1 in legacy
    /// shapes.
    pub(crate) fn data_form(&self, per_channel: bool) -> Vec<AxisDim> {
        use AxisDim::*;
        match self.shapes {
            ShapeConvention::Legacy => {
                // Delays always keep a spectral-window axis.
                let spw_axis = if self.is_flex_spw() && self.cal_type != CalType::Delay {
                    Fixed(1)
                } else {
                    Nspws
                };
                let freq_axis = if per_channel { Nfreqs } else { Fixed(1) };
                vec![NantsData, spw_axis, freq_axis, Ntimes, Njones]
            }
            ShapeConvention::Future if self.is_wide_band() => {
                vec![NantsData, Nspws, Ntimes, Njones]
            }
            ShapeConvention::Future => vec![NantsData, Nfreqs, Ntimes, Njones],
        }
    }

    /// Gain solutions have a value per channel; delays don't.
    pub(crate) fn solutions_per_channel(&self) -> bool {
        self.cal_type != CalType::Delay
    }

    /// Compare two objects. Floats are compared with each parameter's tolerance
    /// unless `opts` overrides it.
    pub fn equals(&self, other: &UVCal, opts: &EqOptions) -> bool {
        if self.shapes != other.shapes {
            debug!(
                "UVCal objects use different array shapes ({} vs. {})",
                self.shapes, other.shapes
            );
            return false;
        }
        for p in PARAMETERS.iter() {
            if opts.allowed_failures.contains(&p.name) {
                continue;
            }
            if !opts.check_extra && p.tier != Tier::Required {
                continue;
            }
            if !(p.eq)(self, other, opts.tolerance.unwrap_or(p.tols)) {
                debug!("UVCal parameter {} differs", p.name);
                return false;
            }
        }
        true
    }

    /// Forget the calibration type. The object can't be written until it's
    /// set again.
    pub fn set_unknown_cal_type(&mut self) {
        self.cal_type = CalType::Unknown;
    }

    /// Label every channel as belonging to the first spectral window.
    pub fn set_flex_spw(&mut self) -> Result<(), CheckError> {
        let nfreqs = self.nfreqs;
        let first_spw = self.spw_array.first().copied();
        match &mut self.freq_info {
            FreqInfo::WideBand { .. } => Err(CheckError::FlexSpwNeedsChannels),
            FreqInfo::Channels(c) => {
                if c.flex_spw_id_array.is_none() {
                    let spw = first_spw.ok_or(CheckError::Missing { name: "spw_array" })?;
                    c.flex_spw_id_array = Some(vec![spw; nfreqs]);
                }
                Ok(())
            }
        }
    }

    /// Discard per-channel frequencies; solutions become per spectral window.
    /// The frequency range of each window is kept if present, otherwise it's
    /// derived from the channel edges.
    pub fn set_wide_band(&mut self) -> Result<(), CheckError> {
        if self.shapes == ShapeConvention::Legacy {
            return Err(CheckError::WideBandNeedsFutureShapes);
        }
        if let FreqInfo::Channels(c) = &self.freq_info {
            let freq_range = match &c.freq_range {
                Some(r) => r.clone(),
                None => self.derived_freq_range(),
            };
            self.freq_info = FreqInfo::WideBand { freq_range };
            self.nfreqs = 1;
        }
        Ok(())
    }

    /// The (low, high) edges of each spectral window's channels. Windows
    /// without channels get NaNs.
    pub(crate) fn derived_freq_range(&self) -> Array2<f64> {
        let mut range = Array2::from_elem((self.spw_array.len(), 2), f64::NAN);
        let Some(c) = self.freq_info.channels() else {
            return range;
        };
        for (i_spw, spw) in self.spw_array.iter().enumerate() {
            let (mut low, mut high) = (f64::INFINITY, f64::NEG_INFINITY);
            for (i_chan, (freq, width)) in c.freq_array.iter().zip(&c.channel_width).enumerate() {
                let in_spw = match &c.flex_spw_id_array {
                    Some(ids) => ids.get(i_chan) == Some(spw),
                    None => true,
                };
                if in_spw {
                    low = low.min(freq - width.abs() / 2.0);
                    high = high.max(freq + width.abs() / 2.0);
                }
            }
            if low.is_finite() && high.is_finite() {
                range[(i_spw, 0)] = low;
                range[(i_spw, 1)] = high;
            }
        }
        range
    }

    /// Fill `telescope_location` and `antenna_diameters` for a known
    /// telescope. Values already present are only replaced if `overwrite` is
    /// set.
    pub fn set_telescope_params(
        &mut self,
        overwrite: bool,
    ) -> Result<Vec<UvcalWarning>, TelescopeError> {
        let name = self.telescope_name.as_deref().ok_or(TelescopeError::NoName)?;
        let telescope =
            known_telescope(name).ok_or_else(|| TelescopeError::Unknown(name.to_string()))?;

        let mut filled = vec![];
        if self.telescope_location.is_none() || overwrite {
            self.telescope_location = Some(telescope.location_ecef());
            filled.push("telescope_location");
        }
        if let Some(diameter) = telescope.antenna_diameter {
            if self.antenna_diameters.is_none() || overwrite {
                self.antenna_diameters = Some(vec![diameter; self.nants_telescope]);
                filled.push("antenna_diameters");
            }
        }

        let mut warnings = vec![];
        if !filled.is_empty() {
            push_warning(
                &mut warnings,
                UvcalWarning::TelescopeParamsFilled {
                    params: filled.join(", "),
                    telescope: telescope.name.to_string(),
                },
            );
        }
        Ok(warnings)
    }

    /// Read a calfits file into a new object.
    pub fn from_calfits<P: AsRef<Path>>(
        file: P,
        opts: &ReadOptions,
    ) -> Result<(UVCal, Vec<UvcalWarning>), UvcalError> {
        Ok(calfits::read(file.as_ref(), opts)?)
    }

    /// Replace this object with the contents of a calfits file. On failure,
    /// this object is left untouched.
    pub fn read_calfits<P: AsRef<Path>>(
        &mut self,
        file: P,
        opts: &ReadOptions,
    ) -> Result<Vec<UvcalWarning>, UvcalError> {
        let (uvc, warnings) = calfits::read(file.as_ref(), opts)?;
        *self = uvc;
        Ok(warnings)
    }

    pub fn write_calfits<P: AsRef<Path>>(
        &self,
        file: P,
        opts: &WriteOptions,
    ) -> Result<Vec<UvcalWarning>, UvcalError> {
        Ok(calfits::write(self, file.as_ref(), opts)?)
    }
}
