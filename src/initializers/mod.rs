// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Building new calibration objects from high-level descriptions.

Arguments are collected in [`NewUvcalArgs`], which can also be read from a
toml or json argument file. Unknown arguments are rejected by name.
 */

mod error;
#[cfg(test)]
mod tests;

pub use error::InitError;

use std::{fs::File, io::Read, path::Path, str::FromStr};

use indexmap::IndexMap;
use itertools::Itertools;
use lazy_static::lazy_static;
use log::debug;
use ndarray::{Array2, ArrayD, IxDyn};
use serde::Deserialize;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    constants::{SECONDS_PER_DAY, VERSION_LINE, VERSION_STRING},
    jones::{jones_str_to_num, JonesConvention},
    telescopes::known_telescope,
    uvcal::{
        CalStyle, CalType, ChannelFreqs, CheckOptions, ExtraKeyword, FreqInfo, GainConvention,
        ShapeConvention, UVCal, XOrientation,
    },
};

#[derive(Debug, Display, EnumIter, EnumString)]
enum ArgFileTypes {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

lazy_static! {
    static ref ARG_FILE_TYPES_COMMA_SEPARATED: String = ArgFileTypes::iter().join(", ");
}

/// How the Jones terms are specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JonesArg {
    /// "linear", "circular" or a single Jones name.
    Convention(String),
    Codes(Vec<i32>),
    Names(Vec<String>),
}

/// Arguments for [`new_uvcal`]. Exactly one of `freq_array` and `freq_range`
/// must be given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewUvcalArgs {
    /// Channel centres \[Hz\].
    pub freq_array: Option<Vec<f64>>,
    /// The (low, high) frequencies of each spectral window \[Hz\]. Results
    /// in a wide-band calibration.
    pub freq_range: Option<Vec<[f64; 2]>>,
    /// \[Hz\]; one value for all channels or one per channel. Defaults to the
    /// spacing of the first two channels.
    pub channel_width: Option<Vec<f64>>,
    pub flex_spw_id_array: Option<Vec<i32>>,
    pub spw_array: Option<Vec<i32>>,

    /// Julian dates.
    pub time_array: Option<Vec<f64>>,
    /// \[seconds\]; defaults to the smallest time spacing.
    pub integration_time: Option<f64>,
    pub time_range: Option<[f64; 2]>,

    /// Antenna number to position relative to the array centre \[metres\].
    pub antenna_positions: Option<IndexMap<i32, [f64; 3]>>,
    /// Defaults to the antenna numbers.
    pub antenna_names: Option<Vec<String>>,
    pub antenna_diameters: Option<Vec<f64>>,
    /// The antennas with solutions. Defaults to all antennas.
    pub ant_array: Option<Vec<i32>>,

    pub telescope_name: Option<String>,
    /// ECEF \[metres\]. Filled in for known telescopes if not given.
    pub telescope_location: Option<[f64; 3]>,

    /// "gain" (default) or "delay".
    pub cal_type: Option<String>,
    /// "redundant" or "sky".
    pub cal_style: Option<String>,
    pub ref_antenna_name: Option<String>,
    pub sky_catalog: Option<String>,
    pub sky_field: Option<String>,
    /// "multiply" or "divide".
    pub gain_convention: Option<String>,
    /// "east" or "north".
    pub x_orientation: Option<String>,
    pub jones_array: Option<JonesArg>,

    pub history: Option<String>,
    pub observer: Option<String>,
    pub git_origin_cal: Option<String>,
    pub git_hash_cal: Option<String>,
    pub extra_keywords: Option<IndexMap<String, ExtraKeyword>>,

    /// Defaults to legacy shapes for per-channel frequencies and future
    /// shapes for wide-band calibrations.
    pub future_array_shapes: Option<bool>,

    /// Fill the data arrays with zeros (and flags with false) and check the
    /// result.
    #[serde(default)]
    pub empty: bool,
}

fn decode_error(what: &str, err: impl std::fmt::Display) -> InitError {
    let err = err.to_string();
    if err.contains("unknown field") {
        InitError::ArgFile(format!("Unrecognized keyword argument in {what}: {err}"))
    } else {
        InitError::ArgFile(format!("Couldn't decode {what}:\n{err}"))
    }
}

impl NewUvcalArgs {
    pub fn from_toml_str(s: &str) -> Result<NewUvcalArgs, InitError> {
        toml::from_str(s).map_err(|e| decode_error("toml arguments", e))
    }

    pub fn from_json_str(s: &str) -> Result<NewUvcalArgs, InitError> {
        serde_json::from_str(s).map_err(|e| decode_error("json arguments", e))
    }

    /// Read arguments from a file, with the format chosen by its extension.
    pub fn from_arg_file<P: AsRef<Path>>(arg_file: P) -> Result<NewUvcalArgs, InitError> {
        let arg_file = arg_file.as_ref();
        debug!("Attempting to parse argument file {}", arg_file.display());

        let arg_file_type = arg_file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ArgFileTypes::from_str(&e).ok());
        let mut contents = String::new();
        match arg_file_type {
            Some(ArgFileTypes::Toml) => {
                debug!("Parsing toml file...");
                File::open(arg_file)?.read_to_string(&mut contents)?;
                Self::from_toml_str(&contents)
            }
            Some(ArgFileTypes::Json) => {
                debug!("Parsing json file...");
                File::open(arg_file)?.read_to_string(&mut contents)?;
                Self::from_json_str(&contents)
            }
            None => Err(InitError::ArgFile(format!(
                "Argument file '{}' doesn't have a recognised file extension! Valid extensions are: {}",
                arg_file.display(),
                *ARG_FILE_TYPES_COMMA_SEPARATED
            ))),
        }
    }
}

fn resolve_jones(jones: JonesArg, x_orientation: XOrientation) -> Result<Vec<i32>, InitError> {
    match jones {
        JonesArg::Codes(codes) => Ok(codes),
        JonesArg::Names(names) => names
            .into_iter()
            .map(|n| jones_str_to_num(&n, Some(x_orientation)).ok_or(InitError::BadJones(n)))
            .collect(),
        JonesArg::Convention(s) => match JonesConvention::from_str(&s.to_lowercase()) {
            Ok(convention) => Ok(convention.codes().to_vec()),
            Err(_) => jones_str_to_num(&s, Some(x_orientation))
                .map(|j| vec![j])
                .ok_or(InitError::BadJones(s)),
        },
    }
}

fn parse_arg<T: FromStr>(
    value: Option<String>,
    name: &'static str,
    err: fn(String) -> InitError,
) -> Result<T, InitError> {
    let value = value.ok_or(InitError::MissingArgument(name))?;
    value.trim().to_lowercase().parse().map_err(|_| err(value))
}

/// Build a new calibration object. Without `empty`, the data arrays are left
/// unset for the caller to fill.
pub fn new_uvcal(args: NewUvcalArgs) -> Result<UVCal, InitError> {
    let NewUvcalArgs {
        freq_array,
        freq_range,
        channel_width,
        flex_spw_id_array,
        spw_array,
        time_array,
        integration_time,
        time_range,
        antenna_positions,
        antenna_names,
        antenna_diameters,
        ant_array,
        telescope_name,
        telescope_location,
        cal_type,
        cal_style,
        ref_antenna_name,
        sky_catalog,
        sky_field,
        gain_convention,
        x_orientation,
        jones_array,
        history,
        observer,
        git_origin_cal,
        git_hash_cal,
        extra_keywords,
        future_array_shapes,
        empty,
    } = args;

    let cal_type = match cal_type {
        None => CalType::Gain,
        Some(s) => match CalType::from_str(&s.trim().to_lowercase()) {
            Ok(t @ (CalType::Gain | CalType::Delay)) => t,
            _ => return Err(InitError::BadCalType(s)),
        },
    };
    let cal_style: CalStyle = parse_arg(cal_style, "cal_style", InitError::BadCalStyle)?;
    if cal_style == CalStyle::Sky
        && (ref_antenna_name.is_none() || sky_catalog.is_none() || sky_field.is_none())
    {
        return Err(InitError::SkyFields);
    }
    let gain_convention: GainConvention =
        parse_arg(gain_convention, "gain_convention", InitError::BadGainConvention)?;
    let x_orientation: XOrientation =
        parse_arg(x_orientation, "x_orientation", InitError::BadXOrientation)?;
    let jones_array = resolve_jones(
        jones_array.ok_or(InitError::MissingArgument("jones_array"))?,
        x_orientation,
    )?;
    let telescope_name = telescope_name.ok_or(InitError::MissingArgument("telescope_name"))?;

    // Antennas.
    let antenna_positions =
        antenna_positions.ok_or(InitError::MissingArgument("antenna_positions"))?;
    let antenna_numbers: Vec<i32> = antenna_positions.keys().copied().collect();
    let positions: Vec<[f64; 3]> = antenna_positions.values().copied().collect();
    let nants_telescope = antenna_numbers.len();
    let antenna_names = match antenna_names {
        Some(names) if names.len() != nants_telescope => {
            return Err(InitError::AntennaNamesLength {
                names: names.len(),
                positions: nants_telescope,
            })
        }
        Some(names) => names,
        None => antenna_numbers.iter().map(|n| n.to_string()).collect(),
    };
    if let Some(d) = &antenna_diameters {
        if d.len() != nants_telescope {
            return Err(InitError::BadLength {
                name: "antenna_diameters",
                got: d.len(),
                expected: nants_telescope,
            });
        }
    }
    let ant_array = ant_array.unwrap_or_else(|| antenna_numbers.clone());
    let missing: Vec<i32> = ant_array
        .iter()
        .copied()
        .filter(|a| !antenna_numbers.contains(a))
        .collect();
    if !missing.is_empty() {
        return Err(InitError::AntsNotInTelescope(missing));
    }

    // Times.
    let time_array = match time_array {
        Some(t) if !t.is_empty() => t,
        _ => return Err(InitError::MissingArgument("time_array")),
    };
    let integration_time = match integration_time {
        Some(t) => t,
        None if time_array.len() < 2 => return Err(InitError::NoIntegrationTime),
        None => {
            time_array
                .iter()
                .tuple_windows()
                .map(|(a, b)| (b - a).abs())
                .fold(f64::INFINITY, f64::min)
                * SECONDS_PER_DAY
        }
    };

    // Frequencies.
    let (freq_info, spw_array, default_shapes) = match (freq_array, freq_range) {
        (Some(_), Some(_)) => return Err(InitError::BothFreqs),
        (None, None) => return Err(InitError::NoFreqs),

        (Some(freq_array), None) => {
            let nfreqs = freq_array.len();
            let channel_width = match channel_width {
                Some(w) if w.len() == nfreqs => w,
                Some(w) if w.len() == 1 => vec![w[0]; nfreqs],
                Some(w) => {
                    return Err(InitError::BadLength {
                        name: "channel_width",
                        got: w.len(),
                        expected: nfreqs,
                    })
                }
                None if nfreqs < 2 => return Err(InitError::NoChannelWidth),
                None => vec![freq_array[1] - freq_array[0]; nfreqs],
            };
            if let Some(ids) = &flex_spw_id_array {
                if ids.len() != nfreqs {
                    return Err(InitError::BadLength {
                        name: "flex_spw_id_array",
                        got: ids.len(),
                        expected: nfreqs,
                    });
                }
            }
            let spw_array = match (spw_array, &flex_spw_id_array) {
                (Some(spws), _) => spws,
                (None, Some(ids)) => ids.iter().copied().unique().collect(),
                (None, None) => vec![0],
            };
            let freq_info = FreqInfo::Channels(ChannelFreqs {
                freq_array,
                channel_width,
                flex_spw_id_array,
                freq_range: None,
            });
            (freq_info, spw_array, ShapeConvention::Legacy)
        }

        (None, Some(ranges)) => {
            let nspws = ranges.len();
            let spw_array = match spw_array {
                Some(spws) if spws.len() != nspws => {
                    return Err(InitError::BadLength {
                        name: "spw_array",
                        got: spws.len(),
                        expected: nspws,
                    })
                }
                Some(spws) => spws,
                None => (0..nspws as i32).collect(),
            };
            let freq_range = Array2::from_shape_fn((nspws, 2), |(i, j)| ranges[i][j]);
            (
                FreqInfo::WideBand { freq_range },
                spw_array,
                ShapeConvention::Future,
            )
        }
    };
    let shapes = match future_array_shapes {
        Some(true) => ShapeConvention::Future,
        Some(false) => ShapeConvention::Legacy,
        None => default_shapes,
    };
    if shapes == ShapeConvention::Legacy && matches!(freq_info, FreqInfo::WideBand { .. }) {
        return Err(InitError::WideBandLegacyShapes);
    }

    let mut history = history.unwrap_or_default();
    if !history.contains(VERSION_LINE.as_str()) {
        if !history.is_empty() && !history.ends_with('\n') {
            history.push('\n');
        }
        history.push_str("Object created by new_uvcal().\n");
        history.push_str(&VERSION_STRING);
    }

    let mut uvc = UVCal {
        nants_data: ant_array.len(),
        nants_telescope,
        nspws: spw_array.len(),
        nfreqs: freq_info.freq_array().map(|f| f.len()).unwrap_or(1),
        ntimes: time_array.len(),
        njones: jones_array.len(),
        cal_type,
        cal_style: Some(cal_style),
        ref_antenna_name,
        sky_catalog,
        sky_field,
        gain_convention: Some(gain_convention),
        x_orientation: Some(x_orientation),
        telescope_name: Some(telescope_name),
        telescope_location,
        antenna_names,
        antenna_numbers,
        antenna_positions: Some(Array2::from_shape_fn((nants_telescope, 3), |(i, j)| {
            positions[i][j]
        })),
        antenna_diameters,
        ant_array,
        spw_array,
        freq_info,
        time_array,
        integration_time: Some(integration_time),
        time_range,
        jones_array,
        shapes,
        history,
        observer,
        git_origin_cal,
        git_hash_cal,
        extra_keywords: extra_keywords.unwrap_or_default(),
        ..Default::default()
    };

    // Delays need a frequency range per window; with future shapes they're
    // wide-band.
    if uvc.cal_type == CalType::Delay && !uvc.is_wide_band() {
        match uvc.shapes {
            ShapeConvention::Future => uvc.set_wide_band()?,
            ShapeConvention::Legacy => {
                let derived = uvc.derived_freq_range();
                if let FreqInfo::Channels(c) = &mut uvc.freq_info {
                    c.freq_range.get_or_insert(derived);
                }
            }
        }
    }

    let is_known = uvc.telescope_name.as_deref().and_then(known_telescope).is_some();
    if uvc.telescope_location.is_none() && is_known {
        uvc.set_telescope_params(false)?;
    }

    if empty {
        let shape = |uvc: &UVCal, name: &str| IxDyn(&uvc.expected_shape(name).unwrap_or_default());
        match uvc.cal_type {
            CalType::Delay => uvc.delay_array = Some(ArrayD::zeros(shape(&uvc, "delay_array"))),
            _ => uvc.gain_array = Some(ArrayD::zeros(shape(&uvc, "gain_array"))),
        }
        uvc.flag_array = Some(ArrayD::from_elem(shape(&uvc, "flag_array"), false));
        uvc.quality_array = Some(ArrayD::zeros(shape(&uvc, "quality_array")));
        uvc.check(&CheckOptions::default())?;
    }

    Ok(uvc)
}

/// The metadata of a visibility data set that calibration solutions can be
/// derived from.
pub trait VisMetadata {
    fn freq_array(&self) -> Vec<f64>;
    fn channel_width(&self) -> Vec<f64>;
    fn flex_spw_id_array(&self) -> Option<Vec<i32>> {
        None
    }
    fn spw_array(&self) -> Vec<i32>;
    /// The unique times of the data.
    fn time_array(&self) -> Vec<f64>;
    fn integration_time(&self) -> Option<f64>;
    fn antenna_numbers(&self) -> Vec<i32>;
    fn antenna_names(&self) -> Vec<String>;
    /// Shape (nants_telescope, 3) \[metres\].
    fn antenna_positions(&self) -> Array2<f64>;
    /// The antennas that appear in any baseline.
    fn ants_with_data(&self) -> Vec<i32>;
    fn telescope_name(&self) -> String;
    fn telescope_location(&self) -> Option<[f64; 3]>;
    fn x_orientation(&self) -> Option<XOrientation>;
    fn polarization_array(&self) -> Vec<i32>;
}

/// The parallel-hand Jones terms matching some visibility polarisations.
fn jones_from_pols(pols: &[i32]) -> Vec<i32> {
    let circular = pols.iter().any(|p| (-4..=-1).contains(p))
        && !pols.iter().any(|p| (-8..=-5).contains(p));
    let parallel = if circular { [-1, -2] } else { [-5, -6] };
    let present: Vec<i32> = parallel.into_iter().filter(|j| pols.contains(j)).collect();
    if present.is_empty() {
        parallel.to_vec()
    } else {
        present
    }
}

/// Build a new calibration object matching visibility data. Arguments that
/// are set take precedence over the visibility metadata.
pub fn new_uvcal_from_vis<V: VisMetadata + ?Sized>(
    vis: &V,
    mut args: NewUvcalArgs,
) -> Result<UVCal, InitError> {
    if args.freq_array.is_none() && args.freq_range.is_none() {
        args.freq_array = Some(vis.freq_array());
        args.channel_width.get_or_insert_with(|| vis.channel_width());
        if args.flex_spw_id_array.is_none() {
            args.flex_spw_id_array = vis.flex_spw_id_array();
        }
        args.spw_array.get_or_insert_with(|| vis.spw_array());
    }
    args.time_array.get_or_insert_with(|| vis.time_array());
    if args.integration_time.is_none() {
        args.integration_time = vis.integration_time();
    }

    if args.antenna_positions.is_none() {
        let positions = vis.antenna_positions();
        args.antenna_positions = Some(
            vis.antenna_numbers()
                .into_iter()
                .zip(positions.outer_iter())
                .map(|(num, pos)| (num, [pos[0], pos[1], pos[2]]))
                .collect(),
        );
        args.antenna_names.get_or_insert_with(|| vis.antenna_names());
    }
    if args.ant_array.is_none() {
        let numbers: Vec<i32> = args
            .antenna_positions
            .as_ref()
            .map(|p| p.keys().copied().collect())
            .unwrap_or_default();
        args.ant_array = Some(
            vis.ants_with_data()
                .into_iter()
                .filter(|a| numbers.contains(a))
                .collect(),
        );
    }

    args.telescope_name.get_or_insert_with(|| vis.telescope_name());
    if args.telescope_location.is_none() {
        args.telescope_location = vis.telescope_location();
    }
    if args.x_orientation.is_none() {
        args.x_orientation = vis.x_orientation().map(|x| x.to_string());
    }
    if args.jones_array.is_none() {
        args.jones_array = Some(JonesArg::Codes(jones_from_pols(&vis.polarization_array())));
    }

    new_uvcal(args)
}
