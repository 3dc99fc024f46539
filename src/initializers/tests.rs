// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use indoc::indoc;
use ndarray::prelude::*;
use tempfile::tempdir;

use super::*;
use crate::tests::*;

#[test]
fn test_new_gain_defaults() {
    let uvc = new_uvcal(test_args("gain")).unwrap();
    assert_eq!(uvc.cal_type, CalType::Gain);
    assert_eq!(uvc.shapes, ShapeConvention::Legacy);
    assert_eq!(uvc.spw_array, vec![0]);
    assert_eq!(uvc.nspws, 1);
    assert_eq!(uvc.nfreqs, NUM_FREQS);
    assert_eq!(uvc.freq_info.channel_width(), Some(&[1e6; NUM_FREQS][..]));
    assert_abs_diff_eq!(uvc.integration_time.unwrap(), 10.0, epsilon = 1e-3);
    assert_eq!(uvc.antenna_names, vec!["0", "1", "2"]);
    assert_eq!(uvc.ant_array, vec![0, 1, 2]);
    assert_eq!(uvc.jones_array, vec![-5, -6, -7, -8]);

    // Known telescope parameters are filled in.
    assert!(uvc.telescope_location.is_some());
    assert_eq!(uvc.antenna_diameters, Some(vec![14.0; NUM_ANTS]));

    assert!(uvc.history.contains("Object created by new_uvcal()."));
    assert!(uvc.history.contains(VERSION_LINE.as_str()));

    assert_eq!(uvc.gain_array.as_ref().unwrap().shape(), &[3, 1, 10, 12, 4]);
    assert!(uvc.flag_array.as_ref().unwrap().iter().all(|&f| !f));
    assert!(uvc.delay_array.is_none());
}

#[test]
fn test_new_without_empty_leaves_data_unset() {
    let args = NewUvcalArgs {
        empty: false,
        ..test_args("gain")
    };
    let uvc = new_uvcal(args).unwrap();
    assert!(uvc.gain_array.is_none());
    assert!(uvc.flag_array.is_none());
    assert!(uvc.quality_array.is_none());
    assert!(matches!(
        uvc.check(&CheckOptions::default()),
        Err(crate::uvcal::CheckError::Missing { .. })
    ));
}

#[test]
fn test_new_wide_band() {
    let uvc = new_uvcal(wide_band_args("gain")).unwrap();
    assert!(uvc.is_wide_band());
    assert_eq!(uvc.shapes, ShapeConvention::Future);
    assert_eq!(uvc.spw_array, vec![0, 1, 2]);
    assert_eq!(uvc.nfreqs, 1);
    assert_eq!(uvc.gain_array.as_ref().unwrap().shape(), &[3, 3, 12, 4]);

    let args = NewUvcalArgs {
        spw_array: Some(vec![4, 5]),
        ..wide_band_args("gain")
    };
    assert!(matches!(
        new_uvcal(args),
        Err(InitError::BadLength {
            name: "spw_array",
            got: 2,
            expected: 3
        })
    ));

    let args = NewUvcalArgs {
        future_array_shapes: Some(false),
        ..wide_band_args("gain")
    };
    assert!(matches!(
        new_uvcal(args),
        Err(InitError::WideBandLegacyShapes)
    ));
}

#[test]
fn test_new_delay() {
    // Legacy delays get a frequency range from their channels.
    let uvc = new_uvcal(test_args("delay")).unwrap();
    assert_eq!(uvc.shapes, ShapeConvention::Legacy);
    assert!(!uvc.is_wide_band());
    assert_eq!(
        uvc.freq_info.freq_range().unwrap(),
        &array![[99.5e6, 109.5e6]]
    );
    assert_eq!(uvc.delay_array.as_ref().unwrap().shape(), &[3, 1, 1, 12, 4]);
    assert_eq!(uvc.quality_array.as_ref().unwrap().shape(), &[3, 1, 1, 12, 4]);

    // Future-shaped delays are wide-band.
    let args = NewUvcalArgs {
        future_array_shapes: Some(true),
        ..test_args("delay")
    };
    let uvc = new_uvcal(args).unwrap();
    assert!(uvc.is_wide_band());
    assert_eq!(uvc.delay_array.as_ref().unwrap().shape(), &[3, 1, 12, 4]);
    assert_eq!(uvc.flag_array.as_ref().unwrap().shape(), &[3, 1, 12, 4]);
}

#[test]
fn test_new_flex_spw() {
    let args = NewUvcalArgs {
        flex_spw_id_array: Some(vec![3, 3, 3, 3, 3, 3, 1, 1, 1, 1]),
        channel_width: Some(vec![1e6]),
        ..test_args("gain")
    };
    let uvc = new_uvcal(args).unwrap();
    // Windows are in order of first appearance.
    assert_eq!(uvc.spw_array, vec![3, 1]);
    assert_eq!(uvc.nspws, 2);
    assert!(uvc.is_flex_spw());
    assert_eq!(uvc.gain_array.as_ref().unwrap().shape(), &[3, 1, 10, 12, 4]);

    let args = NewUvcalArgs {
        flex_spw_id_array: Some(vec![0; 4]),
        ..test_args("gain")
    };
    assert!(matches!(
        new_uvcal(args),
        Err(InitError::BadLength {
            name: "flex_spw_id_array",
            ..
        })
    ));
}

#[test]
fn test_new_jones_args() {
    let jones = |arg: JonesArg| {
        new_uvcal(NewUvcalArgs {
            jones_array: Some(arg),
            ..test_args("gain")
        })
        .map(|uvc| uvc.jones_array)
    };
    assert_eq!(
        jones(JonesArg::Convention("Circular".to_string())).unwrap(),
        vec![-1, -2, -3, -4]
    );
    assert_eq!(
        jones(JonesArg::Convention("Jxx".to_string())).unwrap(),
        vec![-5]
    );
    assert_eq!(jones(JonesArg::Codes(vec![-6, -5])).unwrap(), vec![-6, -5]);
    // With x pointing east, "e" is x.
    assert_eq!(
        jones(JonesArg::Names(vec!["Jee".to_string(), "Jnn".to_string()])).unwrap(),
        vec![-5, -6]
    );
    assert!(matches!(
        jones(JonesArg::Names(vec!["Jqq".to_string()])),
        Err(InitError::BadJones(_))
    ));
    assert!(matches!(
        jones(JonesArg::Convention("stokes".to_string())),
        Err(InitError::BadJones(_))
    ));
}

#[test]
fn test_new_argument_errors() {
    let result = new_uvcal(NewUvcalArgs {
        freq_range: Some(vec![[1e8, 2e8]]),
        ..test_args("gain")
    });
    assert!(matches!(result, Err(InitError::BothFreqs)));

    let result = new_uvcal(NewUvcalArgs {
        freq_array: None,
        ..test_args("gain")
    });
    assert!(matches!(result, Err(InitError::NoFreqs)));

    let result = new_uvcal(test_args("unknown"));
    assert!(matches!(result, Err(InitError::BadCalType(_))));

    let result = new_uvcal(NewUvcalArgs {
        cal_style: Some("fancy".to_string()),
        ..test_args("gain")
    });
    assert!(matches!(result, Err(InitError::BadCalStyle(_))));

    let result = new_uvcal(NewUvcalArgs {
        cal_style: Some("sky".to_string()),
        ref_antenna_name: Some("0".to_string()),
        ..test_args("gain")
    });
    assert!(matches!(result, Err(InitError::SkyFields)));

    let result = new_uvcal(NewUvcalArgs {
        gain_convention: Some("add".to_string()),
        ..test_args("gain")
    });
    assert!(matches!(result, Err(InitError::BadGainConvention(_))));

    let result = new_uvcal(NewUvcalArgs {
        x_orientation: Some("up".to_string()),
        ..test_args("gain")
    });
    assert!(matches!(result, Err(InitError::BadXOrientation(_))));

    let result = new_uvcal(NewUvcalArgs {
        telescope_name: None,
        ..test_args("gain")
    });
    assert!(matches!(
        result,
        Err(InitError::MissingArgument("telescope_name"))
    ));

    let result = new_uvcal(NewUvcalArgs {
        ant_array: Some(vec![0, 9]),
        ..test_args("gain")
    });
    match result {
        Err(InitError::AntsNotInTelescope(ants)) => assert_eq!(ants, vec![9]),
        other => panic!("Expected missing antennas, got {other:?}"),
    }

    let result = new_uvcal(NewUvcalArgs {
        antenna_names: Some(vec!["a".to_string()]),
        ..test_args("gain")
    });
    assert!(matches!(
        result,
        Err(InitError::AntennaNamesLength {
            names: 1,
            positions: 3
        })
    ));

    let result = new_uvcal(NewUvcalArgs {
        channel_width: Some(vec![1e6, 1e6]),
        ..test_args("gain")
    });
    assert!(matches!(
        result,
        Err(InitError::BadLength {
            name: "channel_width",
            ..
        })
    ));

    let result = new_uvcal(NewUvcalArgs {
        freq_array: Some(vec![150e6]),
        ..test_args("gain")
    });
    assert!(matches!(result, Err(InitError::NoChannelWidth)));

    let result = new_uvcal(NewUvcalArgs {
        time_array: Some(vec![2459855.0]),
        ..test_args("gain")
    });
    assert!(matches!(result, Err(InitError::NoIntegrationTime)));

    let result = new_uvcal(NewUvcalArgs {
        time_array: Some(vec![2459855.0]),
        integration_time: Some(8.0),
        ..test_args("gain")
    });
    assert!(result.is_ok(), "{:?}", result.err());
}

#[test]
fn test_new_unknown_telescope() {
    let uvc = new_uvcal(NewUvcalArgs {
        telescope_name: Some("MyTelescope".to_string()),
        ..test_args("gain")
    })
    .unwrap();
    assert!(uvc.telescope_location.is_none());
    assert!(uvc.antenna_diameters.is_none());
}

#[test]
fn test_history_is_kept() {
    let uvc = new_uvcal(NewUvcalArgs {
        history: Some("Calibrated with my pipeline.".to_string()),
        ..test_args("gain")
    })
    .unwrap();
    assert!(uvc
        .history
        .starts_with("Calibrated with my pipeline.\nObject created by new_uvcal().\n"));
    assert!(uvc.history.contains(VERSION_LINE.as_str()));
}

#[test]
fn test_toml_args() {
    let toml = indoc! {r#"
        freq_array = [1.5e8, 1.51e8, 1.52e8]
        time_array = [2459855.0, 2459855.0001]
        integration_time = 8.64
        telescope_name = "HERA"
        cal_style = "redundant"
        gain_convention = "divide"
        x_orientation = "north"
        jones_array = "linear"
        empty = true

        [extra_keywords]
        OBSID = 1090008640
        PI = "me"
    "#};
    let mut args = NewUvcalArgs::from_toml_str(toml).unwrap();
    assert!(matches!(args.jones_array, Some(JonesArg::Convention(_))));
    assert!(args.empty);
    let extra = args.extra_keywords.clone().unwrap();
    assert_eq!(extra["OBSID"], ExtraKeyword::Int(1090008640));
    assert_eq!(extra["PI"], ExtraKeyword::Str("me".to_string()));

    // Antenna numbers can't be toml table keys.
    args.antenna_positions = Some(IndexMap::from_iter([
        (10, [0.0, 0.0, 0.0]),
        (11, [0.0, 14.6, 0.0]),
    ]));
    let uvc = new_uvcal(args).unwrap();
    assert_eq!(uvc.gain_convention, Some(GainConvention::Divide));
    assert_eq!(uvc.x_orientation, Some(XOrientation::North));
    assert_eq!(uvc.antenna_numbers, vec![10, 11]);
    assert_eq!(uvc.extra_keywords.len(), 2);
    assert_eq!(uvc.gain_array.as_ref().unwrap().shape(), &[2, 1, 3, 2, 4]);
}

#[test]
fn test_json_arg_file() {
    let json = indoc! {r#"
        {
            "freq_range": [[1.0e8, 1.2e8], [1.2e8, 1.4e8]],
            "spw_array": [7, 8],
            "time_array": [2459855.0, 2459855.0001, 2459855.0002],
            "antenna_positions": {"0": [0.0, 0.0, 0.0], "1": [10.0, 0.0, 0.0]},
            "antenna_names": ["ant0", "ant1"],
            "telescope_name": "HERA",
            "cal_type": "delay",
            "cal_style": "sky",
            "ref_antenna_name": "ant0",
            "sky_catalog": "GLEAM",
            "sky_field": "phase center",
            "gain_convention": "multiply",
            "x_orientation": "east",
            "jones_array": ["Jee", "Jnn"],
            "empty": true
        }
    "#};
    let dir = tempdir().unwrap();
    let file = dir.path().join("args.JSON");
    std::fs::write(&file, json).unwrap();

    let args = NewUvcalArgs::from_arg_file(&file).unwrap();
    let uvc = new_uvcal(args).unwrap();
    assert_eq!(uvc.cal_type, CalType::Delay);
    assert_eq!(uvc.cal_style, Some(CalStyle::Sky));
    assert_eq!(uvc.spw_array, vec![7, 8]);
    assert_eq!(uvc.antenna_names, vec!["ant0", "ant1"]);
    assert_eq!(uvc.antenna_numbers, vec![0, 1]);
    assert_eq!(uvc.jones_array, vec![-5, -6]);
    assert_eq!(uvc.delay_array.as_ref().unwrap().shape(), &[2, 2, 3, 2]);
}

#[test]
fn test_arg_file_errors() {
    let result = NewUvcalArgs::from_json_str(r#"{"freq_arary": [1.0]}"#);
    match result {
        Err(InitError::ArgFile(msg)) => {
            assert!(msg.contains("Unrecognized keyword argument"), "{msg}")
        }
        other => panic!("Expected an argument file error, got {other:?}"),
    }

    let result = NewUvcalArgs::from_toml_str("freq_array = \"lots\"");
    match result {
        Err(InitError::ArgFile(msg)) => assert!(msg.contains("Couldn't decode"), "{msg}"),
        other => panic!("Expected an argument file error, got {other:?}"),
    }

    let dir = tempdir().unwrap();
    let file = dir.path().join("args.yaml");
    std::fs::write(&file, "freq_array: [1.0]").unwrap();
    match NewUvcalArgs::from_arg_file(&file) {
        Err(InitError::ArgFile(msg)) => assert!(msg.contains("toml, json"), "{msg}"),
        other => panic!("Expected an argument file error, got {other:?}"),
    }

    let result = NewUvcalArgs::from_arg_file(dir.path().join("missing.toml"));
    assert!(matches!(result, Err(InitError::IO(_))));
}

struct MockVis {
    pols: Vec<i32>,
}

impl VisMetadata for MockVis {
    fn freq_array(&self) -> Vec<f64> {
        test_freqs()
    }

    fn channel_width(&self) -> Vec<f64> {
        vec![1e6; NUM_FREQS]
    }

    fn spw_array(&self) -> Vec<i32> {
        vec![0]
    }

    fn time_array(&self) -> Vec<f64> {
        test_times()
    }

    fn integration_time(&self) -> Option<f64> {
        Some(10.0)
    }

    fn antenna_numbers(&self) -> Vec<i32> {
        vec![0, 1, 2, 3]
    }

    fn antenna_names(&self) -> Vec<String> {
        vec!["a0", "a1", "a2", "a3"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn antenna_positions(&self) -> Array2<f64> {
        Array2::from_shape_fn((4, 3), |(i, j)| if j == 0 { i as f64 * 14.6 } else { 0.0 })
    }

    fn ants_with_data(&self) -> Vec<i32> {
        // Antenna 7 isn't part of the telescope.
        vec![3, 0, 2, 7]
    }

    fn telescope_name(&self) -> String {
        "HERA".to_string()
    }

    fn telescope_location(&self) -> Option<[f64; 3]> {
        None
    }

    fn x_orientation(&self) -> Option<XOrientation> {
        Some(XOrientation::East)
    }

    fn polarization_array(&self) -> Vec<i32> {
        self.pols.clone()
    }
}

fn vis_args() -> NewUvcalArgs {
    NewUvcalArgs {
        cal_style: Some("redundant".to_string()),
        gain_convention: Some("multiply".to_string()),
        empty: true,
        ..Default::default()
    }
}

#[test]
fn test_new_from_vis() {
    let vis = MockVis {
        pols: vec![-5, -6, -7, -8],
    };
    let uvc = new_uvcal_from_vis(&vis, vis_args()).unwrap();
    assert_eq!(uvc.nants_telescope, 4);
    assert_eq!(uvc.antenna_names, vec!["a0", "a1", "a2", "a3"]);
    assert_eq!(uvc.ant_array, vec![3, 0, 2]);
    assert_eq!(uvc.jones_array, vec![-5, -6]);
    assert_eq!(uvc.x_orientation, Some(XOrientation::East));
    assert_eq!(uvc.freq_info.freq_array().unwrap(), test_freqs().as_slice());
    assert_eq!(uvc.integration_time, Some(10.0));
    assert!(uvc.telescope_location.is_some());
    assert_eq!(uvc.gain_array.as_ref().unwrap().shape(), &[3, 1, 10, 12, 2]);

    // Arguments take precedence.
    let args = NewUvcalArgs {
        freq_range: Some(vec![[100e6, 110e6]]),
        ant_array: Some(vec![1]),
        jones_array: Some(JonesArg::Codes(vec![-7])),
        ..vis_args()
    };
    let uvc = new_uvcal_from_vis(&vis, args).unwrap();
    assert!(uvc.is_wide_band());
    assert_eq!(uvc.ant_array, vec![1]);
    assert_eq!(uvc.jones_array, vec![-7]);
}

#[test]
fn test_jones_from_pols() {
    assert_eq!(jones_from_pols(&[-1, -2, -3, -4]), vec![-1, -2]);
    assert_eq!(jones_from_pols(&[-6]), vec![-6]);
    assert_eq!(jones_from_pols(&[-5, -6, -7, -8]), vec![-5, -6]);
    // Only cross terms; fall back to both parallel hands.
    assert_eq!(jones_from_pols(&[-7, -8]), vec![-5, -6]);
    // Pseudo-Stokes.
    assert_eq!(jones_from_pols(&[1, 2]), vec![-5, -6]);
}
