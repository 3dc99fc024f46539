// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{path::Path, str::FromStr};

use fitsio::{hdu::FitsHdu, FitsFile};
use indexmap::IndexMap;
use log::{debug, trace};
use ndarray::{Array2, ArrayD, Axis, IxDyn, Zip};
use num_complex::Complex64 as c64;

use super::*;
use crate::{
    constants::TEXT_CARD_CHUNK_LEN,
    io::fits::*,
    telescopes::known_telescope,
    uvcal::{
        push_warning, CalStyle, CalType, ChannelFreqs, ExtraKeyword, FreqInfo, GainConvention,
        UVCal, UvcalWarning, XOrientation,
    },
};

fn get_optional_bool(
    fptr: &mut FitsFile,
    hdu: &FitsHdu,
    key: &'static str,
) -> Result<Option<bool>, CalfitsReadError> {
    let value: Option<String> = fits_get_optional_key(fptr, hdu, key)?;
    match value.as_deref().map(str::trim) {
        None => Ok(None),
        Some("T") => Ok(Some(true)),
        Some("F") => Ok(Some(false)),
        Some(other) => Err(CalfitsReadError::BadValue {
            key,
            value: other.to_string(),
        }),
    }
}

fn get_optional_enum<T: FromStr>(
    fptr: &mut FitsFile,
    hdu: &FitsHdu,
    key: &'static str,
) -> Result<Option<T>, CalfitsReadError> {
    let value: Option<String> = fits_get_optional_key(fptr, hdu, key)?;
    value
        .map(|v| {
            let v = v.trim();
            T::from_str(&v.to_lowercase()).map_err(|_| CalfitsReadError::BadValue {
                key,
                value: v.to_string(),
            })
        })
        .transpose()
}

fn get_optional_string(
    fptr: &mut FitsFile,
    hdu: &FitsHdu,
    key: &str,
) -> Result<Option<String>, CalfitsReadError> {
    Ok(fits_get_optional_key_long_string(fptr, hdu, key)?)
}

/// Parse "a,b".
fn parse_pair(
    fptr: &mut FitsFile,
    hdu: &FitsHdu,
    key: &'static str,
) -> Result<Option<[f64; 2]>, CalfitsReadError> {
    let Some(value) = get_optional_string(fptr, hdu, key)? else {
        return Ok(None);
    };
    let bad_value = || CalfitsReadError::BadValue {
        key,
        value: value.clone(),
    };
    let (a, b) = value.split_once(',').ok_or_else(bad_value)?;
    match (a.trim().parse(), b.trim().parse()) {
        (Ok(a), Ok(b)) => Ok(Some([a, b])),
        _ => Err(bad_value()),
    }
}

/// The reference value and increment of a data axis.
fn get_axis(
    fptr: &mut FitsFile,
    hdu: &FitsHdu,
    axis: usize,
) -> Result<(f64, f64), CalfitsReadError> {
    let crval = fits_get_required_key(fptr, hdu, &format!("CRVAL{axis}"))?;
    let cdelt = fits_get_required_key(fptr, hdu, &format!("CDELT{axis}"))?;
    Ok((crval, cdelt))
}

fn axis_values(crval: f64, cdelt: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| crval + i as f64 * cdelt).collect()
}

/// Secondary data HDUs must describe their axes the same way as the primary.
/// `axes` pairs each secondary axis number with the primary's.
fn check_axes_match(
    fptr: &mut FitsFile,
    primary: &FitsHdu,
    hdu: &FitsHdu,
    hdu_name: &'static str,
    axes: &[(usize, usize)],
) -> Result<(), CalfitsReadError> {
    for &(axis, primary_axis) in axes {
        for prefix in ["CDELT", "CRVAL"] {
            let key = format!("{prefix}{axis}");
            let expected: f64 =
                fits_get_required_key(fptr, primary, &format!("{prefix}{primary_axis}"))?;
            let actual: f64 = fits_get_required_key(fptr, hdu, &key)?;
            if actual != expected {
                return Err(CalfitsReadError::HeaderMismatch { hdu: hdu_name, key });
            }
        }
    }
    Ok(())
}

/// Read an image, checking that it has the expected number of axes.
fn read_image<T>(
    fptr: &mut FitsFile,
    hdu: &FitsHdu,
    hdu_name: &'static str,
    num_axes: usize,
) -> Result<ArrayD<T>, CalfitsReadError>
where
    Vec<T>: fitsio::images::ReadImage,
{
    let dims = fits_get_image_dims(fptr, hdu)?;
    if dims.len() != num_axes {
        return Err(CalfitsReadError::BadShape {
            hdu: hdu_name,
            reason: format!("expected {num_axes} axes, found {}", dims.len()),
        });
    }
    let data: Vec<T> = fits_get_image(fptr, hdu)?;
    ArrayD::from_shape_vec(IxDyn(&dims), data).map_err(|e| CalfitsReadError::BadShape {
        hdu: hdu_name,
        reason: e.to_string(),
    })
}

/// Read flags from a six-axis integer HDU.
fn read_flag_hdu(
    fptr: &mut FitsFile,
    primary: &FitsHdu,
    hdu: &FitsHdu,
    hdu_name: &'static str,
) -> Result<ArrayD<bool>, CalfitsReadError> {
    check_axes_match(
        fptr,
        primary,
        hdu,
        hdu_name,
        &[
            (JONES_AXIS, JONES_AXIS),
            (TIME_AXIS, TIME_AXIS),
            (FREQ_AXIS, FREQ_AXIS),
            (SPW_AXIS, SPW_AXIS),
        ],
    )?;
    let flags: ArrayD<i32> = read_image(fptr, hdu, hdu_name, 6)?;
    Ok(flags.index_axis(Axis(5), 0).mapv(|f| f != 0))
}

fn parse_complex(value: &str) -> Option<c64> {
    let inner = value.strip_prefix('(')?.strip_suffix(')')?;
    let (re, im) = inner.split_once(',')?;
    Some(c64::new(parse_float(re)?, parse_float(im)?))
}

fn parse_float(value: &str) -> Option<f64> {
    value.trim().replace(['D', 'd'], "E").parse().ok()
}

/// Interpret a header value by its FITS syntax.
fn read_extra_keyword(
    fptr: &mut FitsFile,
    hdu: &FitsHdu,
    card: &FitsCard,
    name: &str,
) -> Result<ExtraKeyword, CalfitsReadError> {
    let value = card.value.trim();
    let keyword = if value.starts_with('\'') {
        // This also follows CONTINUE cards.
        let s = get_optional_string(fptr, hdu, name)?.unwrap_or_else(|| {
            value
                .trim_matches('\'')
                .replace("''", "'")
                .trim_end()
                .to_string()
        });
        ExtraKeyword::Str(s)
    } else if value == "T" || value == "F" {
        ExtraKeyword::Bool(value == "T")
    } else if let Some(c) = parse_complex(value) {
        ExtraKeyword::Complex(c)
    } else if let Ok(i) = value.parse::<i64>() {
        ExtraKeyword::Int(i)
    } else if let Some(f) = parse_float(value) {
        ExtraKeyword::Float(f)
    } else {
        ExtraKeyword::Str(value.to_string())
    };
    Ok(keyword)
}

/// HISTORY, COMMENT and extra keywords from the primary header.
struct HeaderText {
    history: String,
    extra_keywords: IndexMap<String, ExtraKeyword>,
}

/// Join COMMENT or HISTORY card contents back into text. Only a card of
/// exactly a full chunk followed by '&' continues onto the next card, so lines
/// that genuinely end in '&' survive.
fn join_text_cards<'a>(cards: impl IntoIterator<Item = &'a str>) -> String {
    let mut text = String::new();
    for card in cards {
        match card.strip_suffix('&') {
            Some(continued) if continued.chars().count() == TEXT_CARD_CHUNK_LEN => {
                text.push_str(continued)
            }
            _ => {
                text.push_str(card);
                text.push('\n');
            }
        }
    }
    if text.ends_with('\n') {
        text.pop();
    }
    text
}

fn read_header_text(
    fptr: &mut FitsFile,
    primary: &FitsHdu,
) -> Result<HeaderText, CalfitsReadError> {
    let cards = fits_get_cards(fptr, primary)?;
    let mut history = vec![];
    let mut comment = vec![];
    let mut extra_keywords = IndexMap::new();
    for card in &cards {
        match card.name.as_str() {
            "HISTORY" => history.push(card.comment.as_str()),
            "COMMENT" if CFITSIO_COMMENTS.contains(&card.comment.trim()) => (),
            "COMMENT" => comment.push(card.comment.as_str()),
            name => {
                let name = name.strip_prefix("HIERARCH ").unwrap_or(name).trim();
                if is_reserved_key(name) {
                    continue;
                }
                trace!("Reading extra keyword {name}");
                let value = read_extra_keyword(fptr, primary, card, name)?;
                extra_keywords.insert(name.to_string(), value);
            }
        }
    }
    if !comment.is_empty() {
        extra_keywords.insert(
            "COMMENT".to_string(),
            ExtraKeyword::Str(join_text_cards(comment)),
        );
    }

    Ok(HeaderText {
        history: join_text_cards(history),
        extra_keywords,
    })
}

struct Antennas {
    names: Vec<String>,
    numbers: Vec<i32>,
    ant_array: Vec<i32>,
    positions: Option<Array2<f64>>,
    diameters: Option<Vec<f64>>,
}

fn read_antennas(fptr: &mut FitsFile, nants_data: usize) -> Result<Antennas, CalfitsReadError> {
    let hdu =
        fits_get_optional_hdu(fptr, ANTENNAS_HDU)?.ok_or(CalfitsReadError::MissingHdu(ANTENNAS_HDU))?;
    let names: Vec<String> = fits_get_col(fptr, &hdu, "ANTNAME")?;
    let numbers: Vec<i32> = fits_get_col(fptr, &hdu, "ANTINDEX")?;
    let mut ant_array: Vec<i32> = fits_get_col(fptr, &hdu, "ANTARR")?;
    if ant_array.len() < nants_data {
        return Err(CalfitsReadError::BadShape {
            hdu: ANTENNAS_HDU,
            reason: format!(
                "ANTARR has {} entries, but the data have {nants_data} antennas",
                ant_array.len()
            ),
        });
    }
    ant_array.truncate(nants_data);
    let positions = fits_get_optional_double_vector_col(fptr, &hdu, "ANTXYZ", 3)?;
    let diameters = if fits_has_col(fptr, &hdu, "ANTDIAM")? {
        Some(fits_get_col(fptr, &hdu, "ANTDIAM")?)
    } else {
        None
    };
    Ok(Antennas {
        names: names.into_iter().map(|n| n.trim().to_string()).collect(),
        numbers,
        ant_array,
        positions,
        diameters,
    })
}

/// Read a calfits file.
pub(crate) fn read(
    file: &Path,
    opts: &ReadOptions,
) -> Result<(UVCal, Vec<UvcalWarning>), CalfitsReadError> {
    debug!("Reading calfits file {}", file.display());
    let mut warnings = vec![];
    let mut fptr = fits_open(file)?;
    let primary = fits_open_hdu(&mut fptr, 0)?;

    let cal_type_str: String = fits_get_required_key(&mut fptr, &primary, "CALTYPE")?;
    let cal_type = match CalType::from_str(&cal_type_str.trim().to_lowercase()) {
        Ok(CalType::Unknown) | Err(_) => {
            return Err(CalfitsReadError::UnknownCalType(cal_type_str))
        }
        Ok(t) => t,
    };
    let wide_band = get_optional_bool(&mut fptr, &primary, "WIDEBAND")?.unwrap_or(false);
    let flex_spw = get_optional_bool(&mut fptr, &primary, "FLEXSPW")?.unwrap_or(false);
    if wide_band && opts.shapes == ShapeConvention::Legacy {
        return Err(CalfitsReadError::WideBandNeedsFuture);
    }

    // Primary data.
    let data: ArrayD<f64> = read_image(&mut fptr, &primary, "PRIMARY", 6)?;
    let expected_planes = match cal_type {
        CalType::Delay => 2,
        _ => 4,
    };
    let (nants_data, n_if, ntimes, njones, num_planes) = match *data.shape() {
        [nants_data, n_if, _, ntimes, njones, num_planes] => {
            (nants_data, n_if, ntimes, njones, num_planes)
        }
        _ => {
            return Err(CalfitsReadError::BadShape {
                hdu: "PRIMARY",
                reason: "expected 6 axes".to_string(),
            })
        }
    };
    if num_planes != expected_planes {
        return Err(CalfitsReadError::BadShape {
            hdu: "PRIMARY",
            reason: format!("expected {expected_planes} values per solution, found {num_planes}"),
        });
    }
    let plane = |i: usize| data.index_axis(Axis(5), i).to_owned();
    let (mut gain_array, mut delay_array, mut quality_array) = match cal_type {
        CalType::Delay => (None, Some(plane(0)), plane(1)),
        _ => {
            let gains = Zip::from(&plane(0))
                .and(&plane(1))
                .map_collect(|&re, &im| c64::new(re, im));
            (Some(gains), None, plane(3))
        }
    };
    let mut flag_array = match cal_type {
        CalType::Delay => {
            let hdu = fits_get_optional_hdu(&mut fptr, FLAGS_HDU)?
                .ok_or(CalfitsReadError::MissingHdu(FLAGS_HDU))?;
            read_flag_hdu(&mut fptr, &primary, &hdu, FLAGS_HDU)?
        }
        _ => plane(2).mapv(|f| f != 0.0),
    };

    let mut input_flag_array = match fits_get_optional_hdu(&mut fptr, INPUT_FLAGS_HDU)? {
        Some(hdu) => {
            // A check reports this too.
            if !opts.run_check {
                push_warning(&mut warnings, UvcalWarning::DeprecatedInputFlagArray);
            }
            Some(read_flag_hdu(&mut fptr, &primary, &hdu, INPUT_FLAGS_HDU)?)
        }
        None => None,
    };

    let mut total_quality_array = match fits_get_optional_hdu(&mut fptr, TOTAL_QUALITY_HDU)? {
        Some(hdu) => {
            check_axes_match(
                &mut fptr,
                &primary,
                &hdu,
                TOTAL_QUALITY_HDU,
                &[
                    (JONES_AXIS - 1, JONES_AXIS),
                    (TIME_AXIS - 1, TIME_AXIS),
                    (FREQ_AXIS - 1, FREQ_AXIS),
                    (SPW_AXIS - 1, SPW_AXIS),
                ],
            )?;
            Some(read_image::<f64>(&mut fptr, &hdu, TOTAL_QUALITY_HDU, 4)?)
        }
        None => None,
    };

    // Axes.
    let (jones0, jones_delta) = get_axis(&mut fptr, &primary, JONES_AXIS)?;
    let jones_array: Vec<i32> = axis_values(jones0, jones_delta, njones)
        .into_iter()
        .map(|j| j.round() as i32)
        .collect();
    let (time0, time_delta) = get_axis(&mut fptr, &primary, TIME_AXIS)?;
    let time_array = axis_values(time0, time_delta, ntimes);
    let (freq0, freq_delta) = get_axis(&mut fptr, &primary, FREQ_AXIS)?;
    let (spw0, _) = get_axis(&mut fptr, &primary, SPW_AXIS)?;

    let nspws: usize = fits_get_optional_key(&mut fptr, &primary, "NSPWS")?.unwrap_or(n_if);
    let nfreqs: usize = fits_get_optional_key(&mut fptr, &primary, "NFREQS")?
        .unwrap_or_else(|| flag_array.shape()[2]);

    // Spectral windows.
    let (spw_array, table_freq_range) = if nspws > 1 {
        let hdu = fits_get_optional_hdu(&mut fptr, SPWS_HDU)?
            .ok_or(CalfitsReadError::MissingHdu(SPWS_HDU))?;
        let spw_array: Vec<i32> = fits_get_col(&mut fptr, &hdu, "SPWID")?;
        let freq_range = if fits_has_col(&fptr, &hdu, "FRQLOW")? {
            let low: Vec<f64> = fits_get_col(&mut fptr, &hdu, "FRQLOW")?;
            let high: Vec<f64> = fits_get_col(&mut fptr, &hdu, "FRQHIGH")?;
            Some(Array2::from_shape_fn((low.len(), 2), |(i, j)| {
                if j == 0 {
                    low[i]
                } else {
                    high[i]
                }
            }))
        } else {
            None
        };
        (spw_array, freq_range)
    } else {
        (vec![spw0.round() as i32], None)
    };
    let freq_range = match table_freq_range {
        Some(r) => Some(r),
        None => parse_pair(&mut fptr, &primary, "FRQRANGE")?
            .map(|[low, high]| Array2::from_shape_vec((1, 2), vec![low, high]))
            .transpose()
            .map_err(|e| CalfitsReadError::BadShape {
                hdu: "PRIMARY",
                reason: e.to_string(),
            })?,
    };

    // Frequencies.
    let freq_info = if wide_band {
        FreqInfo::WideBand {
            freq_range: freq_range.ok_or(CalfitsReadError::MissingFreqRange)?,
        }
    } else if flex_spw {
        let hdu = fits_get_optional_hdu(&mut fptr, FREQS_HDU)?
            .ok_or(CalfitsReadError::MissingHdu(FREQS_HDU))?;
        FreqInfo::Channels(ChannelFreqs {
            freq_array: fits_get_col(&mut fptr, &hdu, "FREQ")?,
            channel_width: fits_get_col(&mut fptr, &hdu, "CHANWID")?,
            flex_spw_id_array: Some(fits_get_col(&mut fptr, &hdu, "SPWID")?),
            freq_range,
        })
    } else {
        let channel_width: f64 = fits_get_required_key(&mut fptr, &primary, "CHWIDTH")?;
        FreqInfo::Channels(ChannelFreqs {
            freq_array: axis_values(freq0, freq_delta, nfreqs),
            channel_width: vec![channel_width; nfreqs],
            flex_spw_id_array: None,
            freq_range,
        })
    };

    // Wide-band files hold future-shaped arrays with a unit frequency axis.
    if wide_band {
        gain_array = gain_array.map(|a| drop_freq_axis(a, 2)).transpose()?;
        delay_array = delay_array.map(|a| drop_freq_axis(a, 2)).transpose()?;
        quality_array = drop_freq_axis(quality_array, 2)?;
        flag_array = drop_freq_axis(flag_array, 2)?;
        input_flag_array = input_flag_array
            .map(|a| drop_freq_axis(a, 2))
            .transpose()?;
        total_quality_array = total_quality_array
            .map(|a| drop_freq_axis(a, 1))
            .transpose()?;
    }

    let antennas = read_antennas(&mut fptr, nants_data)?;
    let HeaderText {
        history,
        extra_keywords,
    } = read_header_text(&mut fptr, &primary)?;

    let telescope_location = match (
        fits_get_optional_key(&mut fptr, &primary, "ARRAYX")?,
        fits_get_optional_key(&mut fptr, &primary, "ARRAYY")?,
        fits_get_optional_key(&mut fptr, &primary, "ARRAYZ")?,
    ) {
        (Some(x), Some(y), Some(z)) => Some([x, y, z]),
        _ => None,
    };

    let mut uvc = UVCal {
        nants_data,
        nants_telescope: antennas.numbers.len(),
        nspws,
        nfreqs: if wide_band { 1 } else { nfreqs },
        ntimes,
        njones,

        cal_type,
        cal_style: get_optional_enum::<CalStyle>(&mut fptr, &primary, "CALSTYLE")?,
        ref_antenna_name: get_optional_string(&mut fptr, &primary, "REFANT")?,
        sky_catalog: get_optional_string(&mut fptr, &primary, "CATALOG")?,
        sky_field: get_optional_string(&mut fptr, &primary, "FIELD")?,
        gain_convention: get_optional_enum::<GainConvention>(&mut fptr, &primary, "GNCONV")?,
        x_orientation: get_optional_enum::<XOrientation>(&mut fptr, &primary, "XORIENT")?,

        telescope_name: get_optional_string(&mut fptr, &primary, "TELESCOP")?,
        telescope_location,
        antenna_names: antennas.names,
        antenna_numbers: antennas.numbers,
        antenna_positions: antennas.positions,
        antenna_diameters: antennas.diameters,
        ant_array: antennas.ant_array,

        spw_array,
        freq_info,
        time_array,
        integration_time: fits_get_optional_key(&mut fptr, &primary, "INTTIME")?,
        time_range: parse_pair(&mut fptr, &primary, "TMERANGE")?,
        jones_array,

        gain_array,
        delay_array,
        flag_array: Some(flag_array),
        quality_array: Some(quality_array),
        total_quality_array,
        input_flag_array,

        shapes: if wide_band {
            ShapeConvention::Future
        } else {
            ShapeConvention::Legacy
        },

        history,
        observer: get_optional_string(&mut fptr, &primary, "OBSERVER")?,
        git_origin_cal: get_optional_string(&mut fptr, &primary, "GITORIG")?,
        git_hash_cal: get_optional_string(&mut fptr, &primary, "GITHASH")?,
        extra_keywords,
    };
    drop(fptr);

    let (history, appended) = history_with_version(&uvc.history);
    if appended {
        uvc.history = history;
        push_warning(&mut warnings, UvcalWarning::HistoryVersionAppended);
    }

    if uvc.telescope_location.is_none()
        && uvc
            .telescope_name
            .as_deref()
            .and_then(known_telescope)
            .is_some()
    {
        warnings.extend(uvc.set_telescope_params(false)?);
    }

    if opts.shapes == ShapeConvention::Future && !wide_band {
        warnings.extend(uvc.use_future_array_shapes()?);
    }

    if opts.run_check {
        warnings.extend(uvc.check(&opts.check)?);
    }

    Ok((uvc, warnings))
}

fn drop_freq_axis<T>(array: ArrayD<T>, axis: usize) -> Result<ArrayD<T>, CalfitsReadError> {
    if array.shape().get(axis) != Some(&1) {
        return Err(CalfitsReadError::BadShape {
            hdu: "PRIMARY",
            reason: "wide-band data must have a FREQS axis of length 1".to_string(),
        });
    }
    Ok(array.index_axis_move(Axis(axis), 0))
}
