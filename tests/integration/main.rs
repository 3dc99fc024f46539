// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod calfits;
mod params;

use indexmap::IndexMap;

use uvcal::{initializers::JonesArg, new_uvcal, NewUvcalArgs, UVCal};

/// Arguments for a small HERA gain calibration.
fn get_args() -> NewUvcalArgs {
    NewUvcalArgs {
        freq_array: Some((0..8).map(|i| 150e6 + i as f64 * 97.65625e3).collect()),
        time_array: Some(
            (0..5)
                .map(|i| 2459900.25 + i as f64 * 2.0 / 86400.0)
                .collect(),
        ),
        antenna_positions: Some(IndexMap::from_iter(
            (0..6).map(|i| (i * 10, [i as f64 * 14.6, 0.0, 0.0])),
        )),
        antenna_names: Some((0..6).map(|i| format!("HH{}", i * 10)).collect()),
        telescope_name: Some("HERA".to_string()),
        cal_style: Some("redundant".to_string()),
        gain_convention: Some("divide".to_string()),
        x_orientation: Some("north".to_string()),
        jones_array: Some(JonesArg::Names(vec!["Jnn".to_string(), "Jee".to_string()])),
        observer: Some("integration tests".to_string()),
        empty: true,
        ..Default::default()
    }
}

fn get_uvcal() -> UVCal {
    let mut uvc = new_uvcal(get_args()).unwrap();
    for (i, g) in uvc.gain_array.as_mut().unwrap().iter_mut().enumerate() {
        *g = uvcal::c64::new((i as f64).cos(), (i as f64).sin());
    }
    uvc
}
