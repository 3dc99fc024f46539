// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpful functions for tests.

use indexmap::IndexMap;

use crate::{
    initializers::{new_uvcal, JonesArg, NewUvcalArgs},
    UVCal,
};

pub(crate) const NUM_ANTS: usize = 3;
pub(crate) const NUM_FREQS: usize = 10;
pub(crate) const NUM_TIMES: usize = 12;

pub(crate) fn test_freqs() -> Vec<f64> {
    (0..NUM_FREQS).map(|i| 100e6 + i as f64 * 1e6).collect()
}

pub(crate) fn test_times() -> Vec<f64> {
    (0..NUM_TIMES)
        .map(|i| 2459855.0 + i as f64 * 10.0 / 86400.0)
        .collect()
}

/// Arguments for a 3-antenna HERA calibration with 10 channels, 12 times and
/// 4 linear Jones terms.
pub(crate) fn test_args(cal_type: &str) -> NewUvcalArgs {
    NewUvcalArgs {
        freq_array: Some(test_freqs()),
        time_array: Some(test_times()),
        antenna_positions: Some(IndexMap::from_iter([
            (0, [0.0, 0.0, 0.0]),
            (1, [14.6, 0.0, 0.0]),
            (2, [0.0, 14.6, 0.0]),
        ])),
        telescope_name: Some("HERA".to_string()),
        cal_type: Some(cal_type.to_string()),
        cal_style: Some("redundant".to_string()),
        gain_convention: Some("multiply".to_string()),
        x_orientation: Some("east".to_string()),
        jones_array: Some(JonesArg::Convention("linear".to_string())),
        empty: true,
        ..Default::default()
    }
}

/// A filled, legacy-shaped gain calibration.
pub(crate) fn gain_uvcal() -> UVCal {
    let mut uvc = new_uvcal(test_args("gain")).unwrap();
    // Give the arrays some structure.
    let gains = uvc.gain_array.as_mut().unwrap();
    for (i, g) in gains.iter_mut().enumerate() {
        *g = crate::c64::new(1.0 + i as f64 / 100.0, -(i as f64) / 200.0);
    }
    let quality = uvc.quality_array.as_mut().unwrap();
    for (i, q) in quality.iter_mut().enumerate() {
        *q = i as f64 * 0.25;
    }
    let flags = uvc.flag_array.as_mut().unwrap();
    for (i, f) in flags.iter_mut().enumerate() {
        *f = i % 7 == 0;
    }
    uvc
}

/// A filled, legacy-shaped delay calibration.
pub(crate) fn delay_uvcal() -> UVCal {
    let mut uvc = new_uvcal(test_args("delay")).unwrap();
    let delays = uvc.delay_array.as_mut().unwrap();
    for (i, d) in delays.iter_mut().enumerate() {
        *d = i as f64 * 1e-9;
    }
    let flags = uvc.flag_array.as_mut().unwrap();
    for (i, f) in flags.iter_mut().enumerate() {
        *f = i % 5 == 0;
    }
    uvc
}

/// Arguments for a wide-band calibration with three spectral windows.
pub(crate) fn wide_band_args(cal_type: &str) -> NewUvcalArgs {
    NewUvcalArgs {
        freq_array: None,
        freq_range: Some(vec![[100e6, 120e6], [120e6, 140e6], [140e6, 160e6]]),
        ..test_args(cal_type)
    }
}
