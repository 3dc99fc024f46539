// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::Path;

use fitsio::{
    images::{ImageDescription, ImageType},
    tables::{ColumnDataType, ColumnDescription},
    FitsFile,
};
use itertools::Itertools;
use log::{debug, trace};
use ndarray::{ArrayD, ArrayViewD, Axis};

use super::*;
use crate::{
    constants::{FREQ_ATOL, SECONDS_PER_DAY, SPACING_RTOL, TEXT_CARD_CHUNK_LEN, TIME_ATOL},
    io::fits::*,
    uvcal::{
        params::{isclose, Tolerance},
        CalType, CheckError, ExtraKeyword, FreqInfo, UVCal, UvcalWarning,
    },
};

/// The description of one data axis.
struct AxisHeader {
    ctype: &'static str,
    cunit: &'static str,
    crval: f64,
    cdelt: f64,
}

impl AxisHeader {
    fn write(&self, fptr: &mut FitsFile, axis: usize) -> Result<(), FitsError> {
        fits_write_string(fptr, &format!("CTYPE{axis}"), self.ctype, None)?;
        fits_write_string(fptr, &format!("CUNIT{axis}"), self.cunit, None)?;
        fits_write_double(fptr, &format!("CRVAL{axis}"), self.crval, None)?;
        fits_write_double(fptr, &format!("CDELT{axis}"), self.cdelt, None)?;
        fits_write_int(fptr, &format!("CRPIX{axis}"), 1, None)?;
        Ok(())
    }
}

/// Axis descriptions shared by every data HDU.
struct Axes {
    jones: AxisHeader,
    time: AxisHeader,
    freq: AxisHeader,
    spw: AxisHeader,
}

impl Axes {
    fn new(uvc: &UVCal) -> Result<Axes, CalfitsWriteError> {
        let jones0 = *uvc
            .jones_array
            .first()
            .ok_or(CalfitsWriteError::EmptyAxis("jones_array"))?;
        let jones_diffs = uvc
            .jones_array
            .iter()
            .tuple_windows()
            .map(|(a, b)| b - a)
            .collect::<Vec<_>>();
        if !jones_diffs.iter().all_equal() {
            return Err(CalfitsWriteError::UnevenJones);
        }
        let jones = AxisHeader {
            ctype: "JONES",
            cunit: "Integer",
            crval: f64::from(jones0),
            cdelt: jones_diffs.first().map_or(-1.0, |&d| f64::from(d)),
        };

        let time0 = *uvc
            .time_array
            .first()
            .ok_or(CalfitsWriteError::EmptyAxis("time_array"))?;
        let time_tols = Tolerance {
            rtol: SPACING_RTOL,
            atol: TIME_ATOL,
        };
        let time_spacing =
            even_spacing(&uvc.time_array, time_tols).ok_or(CalfitsWriteError::UnevenTimes)?;
        let time = AxisHeader {
            ctype: "TIME",
            cunit: "JD",
            crval: time0,
            cdelt: time_spacing
                .unwrap_or_else(|| uvc.integration_time.map_or(0.0, |t| t / SECONDS_PER_DAY)),
        };

        let (freq0, freq_delta) = match &uvc.freq_info {
            FreqInfo::WideBand { freq_range } => {
                if freq_range.nrows() == 0 {
                    return Err(CalfitsWriteError::EmptyAxis("freq_range"));
                }
                let (low, high) = (freq_range[(0, 0)], freq_range[(0, 1)]);
                (low, high - low)
            }

            FreqInfo::Channels(c) => {
                let freq0 = *c
                    .freq_array
                    .first()
                    .ok_or(CalfitsWriteError::EmptyAxis("freq_array"))?;
                let width0 = c.channel_width.first().copied().unwrap_or(0.0);
                let spacing = if c.flex_spw_id_array.is_some() {
                    // The table holds the real frequencies.
                    c.freq_array.get(1).map(|f| f - freq0)
                } else {
                    if !c.channel_width.iter().all(|&w| w == width0) {
                        return Err(CalfitsWriteError::NonUniformChannelWidth);
                    }
                    let freq_tols = Tolerance {
                        rtol: SPACING_RTOL,
                        atol: FREQ_ATOL,
                    };
                    even_spacing(&c.freq_array, freq_tols).ok_or(CalfitsWriteError::UnevenFreqs)?
                };
                (freq0, spacing.unwrap_or(width0))
            }
        };
        let freq = AxisHeader {
            ctype: "FREQS",
            cunit: "Hz",
            crval: freq0,
            cdelt: freq_delta,
        };

        let spw0 = *uvc
            .spw_array
            .first()
            .ok_or(CalfitsWriteError::EmptyAxis("spw_array"))?;
        let spw = AxisHeader {
            ctype: "IF",
            cunit: "Integer",
            crval: f64::from(spw0),
            cdelt: 1.0,
        };

        Ok(Axes {
            jones,
            time,
            freq,
            spw,
        })
    }

    /// Write the headers of a six-axis data HDU.
    fn write_data_axes(&self, fptr: &mut FitsFile) -> Result<(), FitsError> {
        AxisHeader {
            ctype: "Narrays",
            cunit: "Integer",
            crval: 1.0,
            cdelt: 1.0,
        }
        .write(fptr, 1)?;
        self.jones.write(fptr, JONES_AXIS)?;
        self.time.write(fptr, TIME_AXIS)?;
        self.freq.write(fptr, FREQ_AXIS)?;
        self.spw.write(fptr, SPW_AXIS)?;
        AxisHeader {
            ctype: "ANTAXIS",
            cunit: "Integer",
            crval: 0.0,
            cdelt: -1.0,
        }
        .write(fptr, ANT_AXIS)?;
        Ok(())
    }

    /// Total quality has no `Narrays` or `ANTAXIS` axes, so everything moves
    /// down one.
    fn write_total_quality_axes(&self, fptr: &mut FitsFile) -> Result<(), FitsError> {
        self.jones.write(fptr, JONES_AXIS - 1)?;
        self.time.write(fptr, TIME_AXIS - 1)?;
        self.freq.write(fptr, FREQ_AXIS - 1)?;
        self.spw.write(fptr, SPW_AXIS - 1)?;
        Ok(())
    }
}

/// `None` if the values aren't evenly spaced, otherwise their spacing (if
/// there are at least two values).
fn even_spacing(values: &[f64], tols: Tolerance) -> Option<Option<f64>> {
    let diffs: Vec<f64> = values.iter().tuple_windows().map(|(a, b)| b - a).collect();
    match diffs.first() {
        None => Some(None),
        Some(&first) if diffs.iter().all(|&d| isclose(d, first, tols)) => Some(Some(first)),
        Some(_) => None,
    }
}

/// View an array with the axes that legacy shapes would give it. Arrays with
/// an antenna axis have five dimensions; total quality has four.
fn disk_view<'a, T>(uvc: &UVCal, array: &'a ArrayD<T>, has_ant_axis: bool) -> ArrayViewD<'a, T> {
    let offset = usize::from(!has_ant_axis);
    match uvc.shapes {
        ShapeConvention::Legacy => array.view(),
        ShapeConvention::Future if uvc.is_wide_band() => {
            array.view().insert_axis(Axis(2 - offset))
        }
        ShapeConvention::Future => array.view().insert_axis(Axis(1 - offset)),
    }
}

fn required<'a, T>(
    array: &'a Option<ArrayD<T>>,
    name: &'static str,
) -> Result<&'a ArrayD<T>, CalfitsWriteError> {
    array
        .as_ref()
        .ok_or(CalfitsWriteError::Check(CheckError::Missing { name }))
}

fn same_shape<T, U>(
    name: &'static str,
    array: &ArrayViewD<T>,
    reference: &ArrayViewD<U>,
) -> Result<(), CalfitsWriteError> {
    if array.shape() == reference.shape() {
        Ok(())
    } else {
        Err(CalfitsWriteError::MismatchedShape {
            name,
            expected: reference.shape().to_vec(),
            actual: array.shape().to_vec(),
        })
    }
}

/// Image data ready to be written; `dims` is slowest-varying first.
struct Image<T> {
    dims: Vec<usize>,
    data: Vec<T>,
}

/// The primary HDU's data.
fn primary_image(uvc: &UVCal) -> Result<Image<f64>, CalfitsWriteError> {
    let quality = disk_view(uvc, required(&uvc.quality_array, "quality_array")?, true);
    let (shape, data) = match uvc.cal_type {
        CalType::Gain => {
            let gains = disk_view(uvc, required(&uvc.gain_array, "gain_array")?, true);
            let flags = disk_view(uvc, required(&uvc.flag_array, "flag_array")?, true);
            same_shape("flag_array", &flags, &gains)?;
            same_shape("quality_array", &quality, &gains)?;
            let mut data = Vec::with_capacity(gains.len() * 4);
            for ((g, &f), &q) in gains.iter().zip(flags.iter()).zip(quality.iter()) {
                data.extend([g.re, g.im, if f { 1.0 } else { 0.0 }, q]);
            }
            (gains.shape().to_vec(), data)
        }

        CalType::Delay => {
            let delays = disk_view(uvc, required(&uvc.delay_array, "delay_array")?, true);
            same_shape("quality_array", &quality, &delays)?;
            let mut data = Vec::with_capacity(delays.len() * 2);
            for (&d, &q) in delays.iter().zip(quality.iter()) {
                data.extend([d, q]);
            }
            (delays.shape().to_vec(), data)
        }

        CalType::Unknown => return Err(CalfitsWriteError::UnknownCalType),
    };

    let mut dims = shape;
    dims.push(data.len() / dims.iter().product::<usize>().max(1));
    Ok(Image { dims, data })
}

/// Flags as a six-axis integer image.
fn flag_image(uvc: &UVCal, flags: &ArrayD<bool>) -> Image<i32> {
    let flags = disk_view(uvc, flags, true);
    let mut dims = flags.shape().to_vec();
    dims.push(1);
    Image {
        dims,
        data: flags.iter().map(|&f| i32::from(f)).collect(),
    }
}

/// Split text into COMMENT or HISTORY card contents. Lines too long for one
/// card are continued with a trailing '&'.
fn text_cards(text: &str) -> Vec<String> {
    let mut cards = vec![];
    for line in text.split('\n') {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            cards.push(String::new());
            continue;
        }
        let num_chunks = chars.chunks(TEXT_CARD_CHUNK_LEN).len();
        for (i_chunk, chunk) in chars.chunks(TEXT_CARD_CHUNK_LEN).enumerate() {
            let mut card: String = chunk.iter().collect();
            if i_chunk + 1 < num_chunks {
                card.push('&');
            }
            cards.push(card);
        }
    }
    cards
}

fn write_extra_keyword(
    fptr: &mut FitsFile,
    key: &str,
    value: &ExtraKeyword,
) -> Result<(), CalfitsWriteError> {
    trace!("Writing extra keyword {key}");
    match value {
        ExtraKeyword::Bool(b) => fits_write_bool(fptr, key, *b, None)?,
        ExtraKeyword::Int(i) => fits_write_int(fptr, key, *i, None)?,
        ExtraKeyword::Float(f) => fits_write_double(fptr, key, *f, None)?,
        ExtraKeyword::Complex(c) => fits_write_complex(fptr, key, c.re, c.im, None)?,
        ExtraKeyword::Str(s) => fits_write_string(fptr, key, s, None)?,
        ExtraKeyword::List(_) | ExtraKeyword::Map(_) => {
            return Err(CalfitsWriteError::ExtraKeywordType {
                key: key.to_string(),
            })
        }
    }
    Ok(())
}

fn write_primary_header(
    fptr: &mut FitsFile,
    uvc: &UVCal,
    axes: &Axes,
) -> Result<(), CalfitsWriteError> {
    axes.write_data_axes(fptr)?;

    fits_write_string(fptr, "CALTYPE", &uvc.cal_type.to_string(), None)?;
    if let Some(cal_style) = uvc.cal_style {
        fits_write_string(fptr, "CALSTYLE", &cal_style.to_string(), None)?;
    }
    if let Some(gain_convention) = uvc.gain_convention {
        fits_write_string(fptr, "GNCONV", &gain_convention.to_string(), None)?;
    }
    if let Some(x_orientation) = uvc.x_orientation {
        fits_write_string(fptr, "XORIENT", &x_orientation.to_string(), None)?;
    }
    if let Some(name) = &uvc.telescope_name {
        fits_write_string(fptr, "TELESCOP", name, None)?;
    }
    if let Some([x, y, z]) = uvc.telescope_location {
        fits_write_double(fptr, "ARRAYX", x, Some("Telescope ECEF X [m]"))?;
        fits_write_double(fptr, "ARRAYY", y, Some("Telescope ECEF Y [m]"))?;
        fits_write_double(fptr, "ARRAYZ", z, Some("Telescope ECEF Z [m]"))?;
    }
    if let Some(integration_time) = uvc.integration_time {
        fits_write_double(fptr, "INTTIME", integration_time, Some("[s]"))?;
    }
    if let FreqInfo::Channels(c) = &uvc.freq_info {
        if c.flex_spw_id_array.is_none() {
            if let Some(&width) = c.channel_width.first() {
                fits_write_double(fptr, "CHWIDTH", width, Some("[Hz]"))?;
            }
        }
    }
    fits_write_int(fptr, "NSPWS", uvc.nspws as i64, None)?;
    fits_write_int(fptr, "NFREQS", uvc.nfreqs as i64, None)?;
    fits_write_bool(fptr, "FLEXSPW", uvc.is_flex_spw(), None)?;
    fits_write_bool(fptr, "WIDEBAND", uvc.is_wide_band(), None)?;
    if uvc.nspws == 1 {
        if let Some(freq_range) = uvc.freq_info.freq_range() {
            let range = format!("{},{}", freq_range[(0, 0)], freq_range[(0, 1)]);
            fits_write_string(fptr, "FRQRANGE", &range, None)?;
        }
    }
    if let Some([start, end]) = uvc.time_range {
        fits_write_string(fptr, "TMERANGE", &format!("{start},{end}"), None)?;
    }

    for (key, value) in [
        ("OBSERVER", &uvc.observer),
        ("GITORIG", &uvc.git_origin_cal),
        ("GITHASH", &uvc.git_hash_cal),
        ("REFANT", &uvc.ref_antenna_name),
        ("CATALOG", &uvc.sky_catalog),
        ("FIELD", &uvc.sky_field),
    ] {
        if let Some(value) = value {
            fits_write_string(fptr, key, value, None)?;
        }
    }

    for (key, value) in &uvc.extra_keywords {
        let key = key.to_uppercase();
        match (key.as_str(), value) {
            ("COMMENT", ExtraKeyword::Str(comment)) => {
                for card in text_cards(comment) {
                    fits_write_comment(fptr, &card)?;
                }
            }
            _ => write_extra_keyword(fptr, &key, value)?,
        }
    }

    let (history, _) = history_with_version(&uvc.history);
    for card in text_cards(&history) {
        fits_write_history(fptr, &card)?;
    }

    Ok(())
}

fn write_antennas(fptr: &mut FitsFile, uvc: &UVCal) -> Result<(), CalfitsWriteError> {
    let name_width = uvc
        .antenna_names
        .iter()
        .map(|n| n.len())
        .max()
        .unwrap_or(0)
        .max(1);
    let mut cols = vec![
        ColumnDescription::new("ANTNAME")
            .with_type(ColumnDataType::String)
            .that_repeats(name_width)
            .create()?,
        ColumnDescription::new("ANTINDEX")
            .with_type(ColumnDataType::Int)
            .create()?,
        ColumnDescription::new("ANTARR")
            .with_type(ColumnDataType::Int)
            .create()?,
    ];
    if uvc.antenna_positions.is_some() {
        cols.push(
            ColumnDescription::new("ANTXYZ")
                .with_type(ColumnDataType::Double)
                .that_repeats(3)
                .create()?,
        );
    }
    if uvc.antenna_diameters.is_some() {
        cols.push(
            ColumnDescription::new("ANTDIAM")
                .with_type(ColumnDataType::Double)
                .create()?,
        );
    }
    let hdu = fptr.create_table(ANTENNAS_HDU, &cols)?;

    // Antennas without solutions are padded.
    let mut ant_array = uvc.ant_array.clone();
    ant_array.resize(uvc.antenna_numbers.len(), -1);

    fits_write_col(fptr, &hdu, "ANTNAME", &uvc.antenna_names)?;
    fits_write_col(fptr, &hdu, "ANTINDEX", &uvc.antenna_numbers)?;
    fits_write_col(fptr, &hdu, "ANTARR", &ant_array)?;
    if let Some(positions) = &uvc.antenna_positions {
        let positions: Vec<f64> = positions.iter().copied().collect();
        fits_write_col(fptr, &hdu, "ANTXYZ", &positions)?;
    }
    if let Some(diameters) = &uvc.antenna_diameters {
        fits_write_col(fptr, &hdu, "ANTDIAM", diameters)?;
    }
    Ok(())
}

fn write_flag_hdu(
    fptr: &mut FitsFile,
    name: &str,
    image: &Image<i32>,
    axes: &Axes,
) -> Result<(), CalfitsWriteError> {
    let hdu = fptr.create_image(
        name,
        &ImageDescription {
            data_type: ImageType::Long,
            dimensions: &image.dims,
        },
    )?;
    axes.write_data_axes(fptr)?;
    fits_write_image(fptr, &hdu, &image.data)?;
    Ok(())
}

fn write_spws(fptr: &mut FitsFile, uvc: &UVCal) -> Result<(), CalfitsWriteError> {
    let mut cols = vec![ColumnDescription::new("SPWID")
        .with_type(ColumnDataType::Int)
        .create()?];
    let freq_range = uvc.freq_info.freq_range();
    if freq_range.is_some() {
        for name in ["FRQLOW", "FRQHIGH"] {
            cols.push(
                ColumnDescription::new(name)
                    .with_type(ColumnDataType::Double)
                    .create()?,
            );
        }
    }
    let hdu = fptr.create_table(SPWS_HDU, &cols)?;
    fits_write_col(fptr, &hdu, "SPWID", &uvc.spw_array)?;
    if let Some(freq_range) = freq_range {
        let low: Vec<f64> = freq_range.column(0).to_vec();
        let high: Vec<f64> = freq_range.column(1).to_vec();
        fits_write_col(fptr, &hdu, "FRQLOW", &low)?;
        fits_write_col(fptr, &hdu, "FRQHIGH", &high)?;
    }
    Ok(())
}

fn write_flex_freqs(
    fptr: &mut FitsFile,
    freqs: &[f64],
    widths: &[f64],
    spw_ids: &[i32],
) -> Result<(), CalfitsWriteError> {
    let cols = [
        ColumnDescription::new("FREQ")
            .with_type(ColumnDataType::Double)
            .create()?,
        ColumnDescription::new("CHANWID")
            .with_type(ColumnDataType::Double)
            .create()?,
        ColumnDescription::new("SPWID")
            .with_type(ColumnDataType::Int)
            .create()?,
    ];
    let hdu = fptr.create_table(FREQS_HDU, &cols)?;
    fits_write_col(fptr, &hdu, "FREQ", freqs)?;
    fits_write_col(fptr, &hdu, "CHANWID", widths)?;
    fits_write_col(fptr, &hdu, "SPWID", spw_ids)?;
    Ok(())
}

/// Write a calfits file. Everything is validated before the file system is
/// touched.
pub(crate) fn write(
    uvc: &UVCal,
    file: &Path,
    opts: &WriteOptions,
) -> Result<Vec<UvcalWarning>, CalfitsWriteError> {
    let mut warnings = vec![];
    if uvc.cal_type == CalType::Unknown {
        return Err(CalfitsWriteError::UnknownCalType);
    }
    if opts.run_check {
        warnings.extend(uvc.check(&opts.check)?);
    }

    let axes = Axes::new(uvc)?;
    if let Some((key, _)) = uvc.extra_keywords.iter().find(|(_, v)| v.is_container()) {
        return Err(CalfitsWriteError::ExtraKeywordType { key: key.clone() });
    }
    if uvc.ant_array.len() > uvc.antenna_numbers.len() {
        return Err(CalfitsWriteError::AntArrayTooLong {
            nants_data: uvc.ant_array.len(),
            nants_telescope: uvc.antenna_numbers.len(),
        });
    }

    let primary = primary_image(uvc)?;
    let delay_flags = match uvc.cal_type {
        CalType::Delay => Some(flag_image(uvc, required(&uvc.flag_array, "flag_array")?)),
        _ => None,
    };
    let input_flags = uvc
        .input_flag_array
        .as_ref()
        .map(|flags| flag_image(uvc, flags));
    let total_quality = uvc.total_quality_array.as_ref().map(|tq| {
        let tq = disk_view(uvc, tq, false);
        Image {
            dims: tq.shape().to_vec(),
            data: tq.iter().copied().collect::<Vec<f64>>(),
        }
    });

    if file.exists() {
        if !opts.clobber {
            return Err(CalfitsWriteError::FileExists(file.display().to_string()));
        }
        debug!("Removing existing file {}", file.display());
        std::fs::remove_file(file)?;
    }

    debug!("Writing calfits file {}", file.display());
    let mut fptr = fits_create(
        file,
        &ImageDescription {
            data_type: ImageType::Double,
            dimensions: &primary.dims,
        },
    )?;
    write_primary_header(&mut fptr, uvc, &axes)?;
    let hdu = fits_open_hdu(&mut fptr, 0)?;
    fits_write_image(&mut fptr, &hdu, &primary.data)?;

    write_antennas(&mut fptr, uvc)?;

    if let Some(flags) = &delay_flags {
        write_flag_hdu(&mut fptr, FLAGS_HDU, flags, &axes)?;
    }
    if let Some(flags) = &input_flags {
        write_flag_hdu(&mut fptr, INPUT_FLAGS_HDU, flags, &axes)?;
    }

    if let Some(tq) = &total_quality {
        let hdu = fptr.create_image(
            TOTAL_QUALITY_HDU,
            &ImageDescription {
                data_type: ImageType::Double,
                dimensions: &tq.dims,
            },
        )?;
        axes.write_total_quality_axes(&mut fptr)?;
        fits_write_image(&mut fptr, &hdu, &tq.data)?;
    }

    if uvc.nspws > 1 {
        write_spws(&mut fptr, uvc)?;
    }
    if let FreqInfo::Channels(c) = &uvc.freq_info {
        if let Some(spw_ids) = &c.flex_spw_id_array {
            write_flex_freqs(&mut fptr, &c.freq_array, &c.channel_width, spw_ids)?;
        }
    }

    Ok(warnings)
}
