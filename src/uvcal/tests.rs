// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use ndarray::prelude::*;

use super::{
    params::{DType, Tolerance},
    *,
};
use crate::{initializers::new_uvcal, tests::*};

fn flex_uvcal() -> UVCal {
    let mut args = test_args("gain");
    args.flex_spw_id_array = Some(vec![1, 1, 1, 1, 1, 2, 2, 2, 2, 2]);
    new_uvcal(args).unwrap()
}

fn set_flex_ids(uvc: &mut UVCal, ids: Vec<i32>) {
    if let FreqInfo::Channels(c) = &mut uvc.freq_info {
        c.flex_spw_id_array = Some(ids);
    }
}

fn set_freqs(uvc: &mut UVCal, freqs: Vec<f64>) {
    if let FreqInfo::Channels(c) = &mut uvc.freq_info {
        c.freq_array = freqs;
    }
}

#[test]
fn test_check_passes() {
    for uvc in [gain_uvcal(), delay_uvcal(), flex_uvcal()] {
        let result = uvc.check(&CheckOptions::default());
        assert!(result.is_ok(), "{:?}", result.err());
        assert!(result.unwrap().is_empty());
    }
}

#[test]
fn test_check_bad_shape() {
    let mut uvc = gain_uvcal();
    uvc.flag_array = Some(ArrayD::from_elem(IxDyn(&[3, 1, 9, 12, 4]), false));
    match uvc.check(&CheckOptions::default()) {
        Err(CheckError::BadShape {
            name,
            dtype,
            expected,
            actual,
        }) => {
            assert_eq!(name, "flag_array");
            assert_eq!(dtype, DType::Bool);
            assert_eq!(expected, vec![3, 1, 10, 12, 4]);
            assert_eq!(actual, vec![3, 1, 9, 12, 4]);
        }
        other => panic!("Expected a bad shape, got {other:?}"),
    }
}

#[test]
fn test_check_presence() {
    let mut uvc = gain_uvcal();
    uvc.gain_array = None;
    assert!(matches!(
        uvc.check(&CheckOptions::default()),
        Err(CheckError::Missing { name: "gain_array" })
    ));

    let mut uvc = gain_uvcal();
    uvc.delay_array = Some(ArrayD::zeros(IxDyn(&[3, 1, 1, 12, 4])));
    assert!(matches!(
        uvc.check(&CheckOptions::default()),
        Err(CheckError::Forbidden {
            name: "delay_array",
            ..
        })
    ));

    let mut uvc = gain_uvcal();
    uvc.set_unknown_cal_type();
    assert!(matches!(
        uvc.check(&CheckOptions::default()),
        Err(CheckError::Missing { name: "cal_type" })
    ));
}

#[test]
fn test_check_modes() {
    let mut uvc = gain_uvcal();
    uvc.spw_array = vec![0, 1];
    uvc.nspws = 2;
    assert!(matches!(
        uvc.check(&CheckOptions::default()),
        Err(CheckError::MultipleSpwsNeedFlex { nspws: 2 })
    ));

    let mut uvc = new_uvcal(wide_band_args("gain")).unwrap();
    uvc.shapes = ShapeConvention::Legacy;
    assert!(matches!(
        uvc.check(&CheckOptions::default()),
        Err(CheckError::WideBandNeedsFutureShapes)
    ));

    let mut uvc = delay_uvcal();
    uvc.shapes = ShapeConvention::Future;
    assert!(matches!(
        uvc.check(&CheckOptions::default()),
        Err(CheckError::DelayNeedsWideBand)
    ));
}

#[test]
fn test_check_antennas() {
    let mut uvc = gain_uvcal();
    uvc.ant_array = vec![0, 1, 5];
    match uvc.check(&CheckOptions::default()) {
        Err(CheckError::AntsNotInTelescope { ants }) => assert_eq!(ants, vec![5]),
        other => panic!("Expected missing antennas, got {other:?}"),
    }
}

#[test]
fn test_check_flex_spw() {
    let mut uvc = flex_uvcal();
    set_flex_ids(&mut uvc, vec![1, 1, 1, 1, 1, 3, 3, 3, 3, 3]);
    match uvc.check(&CheckOptions::default()) {
        Err(CheckError::FlexSpwIdsNotInSpwArray { ids }) => assert_eq!(ids, vec![3]),
        other => panic!("Expected missing windows, got {other:?}"),
    }

    let mut uvc = flex_uvcal();
    set_flex_ids(&mut uvc, vec![1, 1, 2, 2, 1, 1, 2, 2, 2, 2]);
    assert!(matches!(
        uvc.check(&CheckOptions::default()),
        Err(CheckError::FlexSpwNotGrouped { spw: 1 })
    ));
}

#[test]
fn test_check_freq_spacing() {
    let opts = CheckOptions {
        check_freq_spacing: true,
        ..Default::default()
    };

    let mut uvc = gain_uvcal();
    let mut freqs = test_freqs();
    freqs[3] += 0.1e6;
    set_freqs(&mut uvc, freqs);
    // Only checked on request.
    assert!(uvc.check(&CheckOptions::default()).is_ok());
    assert!(matches!(
        uvc.check(&opts),
        Err(CheckError::UnevenFreqs { spw: 0 })
    ));

    let mut uvc = gain_uvcal();
    set_freqs(&mut uvc, test_freqs().into_iter().rev().collect());
    assert!(matches!(
        uvc.check(&opts),
        Err(CheckError::FreqsNotIncreasing { spw: 0 })
    ));

    // Each flexible window is checked on its own.
    let mut uvc = flex_uvcal();
    let mut freqs = test_freqs();
    for f in freqs.iter_mut().skip(5) {
        *f += 50e6;
    }
    set_freqs(&mut uvc, freqs);
    assert!(uvc.check(&opts).unwrap().is_empty());

    let mut uvc = gain_uvcal();
    if let FreqInfo::Channels(c) = &mut uvc.freq_info {
        c.channel_width = vec![2e6; NUM_FREQS];
    }
    let warnings = uvc.check(&opts).unwrap();
    assert_eq!(
        warnings,
        vec![UvcalWarning::ChannelWidthMismatch {
            spw: 0,
            spacing: 1e6,
            channel_width: 2e6
        }]
    );
}

#[test]
fn test_check_acceptability() {
    let mut uvc = gain_uvcal();
    uvc.integration_time = Some(-1.0);
    match uvc.check(&CheckOptions::default()) {
        Err(e @ CheckError::Unacceptable {
            name: "integration_time",
            dtype: DType::Float,
            ..
        }) => assert!(e.to_string().starts_with("integration_time (float)"), "{e}"),
        other => panic!("Expected an unacceptable value, got {other:?}"),
    }
    let result = uvc.check(&CheckOptions {
        run_check_acceptability: false,
        ..Default::default()
    });
    assert!(result.is_ok(), "{:?}", result.err());

    let mut uvc = gain_uvcal();
    uvc.jones_array = vec![-5, -5, -6, -7];
    assert!(matches!(
        uvc.check(&CheckOptions::default()),
        Err(CheckError::Unacceptable {
            name: "jones_array",
            ..
        })
    ));

    let mut uvc = delay_uvcal();
    if let FreqInfo::Channels(c) = &mut uvc.freq_info {
        c.freq_range = Some(array![[110e6, 100e6]]);
    }
    assert!(matches!(
        uvc.check(&CheckOptions::default()),
        Err(CheckError::Unacceptable {
            name: "freq_range",
            ..
        })
    ));
}

#[test]
fn test_check_warnings() {
    let mut uvc = gain_uvcal();
    uvc.extra_keywords
        .insert("VERYLONGKEY".to_string(), ExtraKeyword::Int(1));
    uvc.extra_keywords.insert(
        "LIST".to_string(),
        ExtraKeyword::List(vec![ExtraKeyword::Bool(true)]),
    );
    uvc.input_flag_array = uvc.flag_array.clone();

    let warnings = uvc.check(&CheckOptions::default()).unwrap();
    assert_eq!(
        warnings,
        vec![
            UvcalWarning::DeprecatedInputFlagArray,
            UvcalWarning::ExtraKeywordKeyTooLong {
                key: "VERYLONGKEY".to_string()
            },
            UvcalWarning::ExtraKeywordNotScalar {
                key: "LIST".to_string()
            },
        ]
    );

    let warnings = uvc
        .check(&CheckOptions {
            check_extra_keyword_types: false,
            ..Default::default()
        })
        .unwrap();
    assert!(!warnings.contains(&UvcalWarning::ExtraKeywordNotScalar {
        key: "LIST".to_string()
    }));
}

#[test]
fn test_equality_tolerances() {
    let uvc = gain_uvcal();

    let mut other = uvc.copy();
    other.gain_array.as_mut().unwrap()[[0, 0, 0, 0, 0]] *= 1.0 + 1e-7;
    assert_eq!(uvc, other);
    let exact = EqOptions {
        tolerance: Some(Tolerance::absolute(0.0)),
        ..Default::default()
    };
    assert!(!uvc.equals(&other, &exact));
    other.gain_array.as_mut().unwrap()[[0, 0, 0, 0, 0]] *= 1.0 + 1e-3;
    assert_ne!(uvc, other);
    let loose = EqOptions {
        tolerance: Some(Tolerance {
            rtol: 1e-2,
            atol: 0.0,
        }),
        ..Default::default()
    };
    assert!(uvc.equals(&other, &loose));
    assert!(uvc.equals(&uvc.copy(), &exact));

    let mut other = uvc.copy();
    other.history.push_str("More history.");
    assert_eq!(uvc, other);
    assert!(!uvc.equals(
        &other,
        &EqOptions {
            allowed_failures: vec![],
            ..Default::default()
        }
    ));

    let mut other = uvc.copy();
    other.observer = Some("me".to_string());
    assert_ne!(uvc, other);
    assert!(uvc.equals(
        &other,
        &EqOptions {
            check_extra: false,
            ..Default::default()
        }
    ));

    // Extra keywords are case insensitive.
    let mut a = uvc.copy();
    let mut b = uvc.copy();
    a.extra_keywords
        .insert("obsid".to_string(), ExtraKeyword::Int(1));
    b.extra_keywords
        .insert("OBSID".to_string(), ExtraKeyword::Int(1));
    assert_eq!(a, b);

    let mut other = uvc.copy();
    other.use_future_array_shapes().unwrap();
    assert_ne!(uvc, other);
}

#[test]
fn test_expected_shape() {
    let uvc = gain_uvcal();
    assert_eq!(uvc.expected_shape("gain_array"), Some(vec![3, 1, 10, 12, 4]));
    assert_eq!(uvc.expected_shape("total_quality_array"), Some(vec![1, 10, 12, 4]));
    assert_eq!(uvc.expected_shape("freq_range"), Some(vec![1, 2]));
    assert_eq!(uvc.expected_shape("not_a_parameter"), None);

    let uvc = delay_uvcal();
    assert_eq!(uvc.expected_shape("delay_array"), Some(vec![3, 1, 1, 12, 4]));
    assert_eq!(uvc.expected_shape("flag_array"), Some(vec![3, 1, 10, 12, 4]));
}

#[test]
fn test_gain_shape_conversion() {
    let uvc = gain_uvcal();
    let mut future = uvc.copy();
    let warnings = future.use_future_array_shapes().unwrap();
    assert!(warnings.is_empty());
    assert_eq!(future.shapes, ShapeConvention::Future);
    assert_eq!(future.gain_array.as_ref().unwrap().shape(), &[3, 10, 12, 4]);
    assert!(future.check(&CheckOptions::default()).is_ok());

    // Converting again does nothing.
    let before = future.copy();
    assert!(future.use_future_array_shapes().unwrap().is_empty());
    assert_eq!(future, before);

    future.use_current_array_shapes().unwrap();
    assert_eq!(future, uvc);
}

#[test]
fn test_delay_shape_conversion() {
    let mut uvc = delay_uvcal();
    {
        let flags = uvc.flag_array.as_mut().unwrap();
        flags.fill(false);
        // All channels of one solution, and one channel of another.
        for chan in 0..NUM_FREQS {
            flags[[0, 0, chan, 0, 0]] = true;
        }
        flags[[1, 0, 3, 0, 0]] = true;
    }

    let warnings = uvc.use_future_array_shapes().unwrap();
    assert_eq!(warnings, vec![UvcalWarning::FlagFreqAxisDropped]);
    assert!(uvc.is_wide_band());
    assert_eq!(uvc.nfreqs, 1);
    assert_eq!(uvc.delay_array.as_ref().unwrap().shape(), &[3, 1, 12, 4]);
    let flags = uvc.flag_array.as_ref().unwrap();
    assert_eq!(flags.shape(), &[3, 1, 12, 4]);
    assert!(flags[[0, 0, 0, 0]]);
    assert!(!flags[[1, 0, 0, 0]]);
    assert_eq!(flags.iter().filter(|&&f| f).count(), 1);

    // The channel edges.
    let range = uvc.freq_info.freq_range().unwrap();
    assert_abs_diff_eq!(range[(0, 0)], 99.5e6);
    assert_abs_diff_eq!(range[(0, 1)], 109.5e6);
    assert!(uvc.check(&CheckOptions::default()).is_ok());

    let before = uvc.copy();
    assert!(matches!(
        uvc.use_current_array_shapes(),
        Err(CheckError::ShapeConversion(_))
    ));
    assert_eq!(uvc, before);
}

#[test]
fn test_set_wide_band() {
    let mut uvc = gain_uvcal();
    assert!(matches!(
        uvc.set_wide_band(),
        Err(CheckError::WideBandNeedsFutureShapes)
    ));
    assert!(!uvc.is_wide_band());

    uvc.use_future_array_shapes().unwrap();
    uvc.set_wide_band().unwrap();
    assert!(uvc.is_wide_band());
    assert_eq!(uvc.nfreqs, 1);
    assert_eq!(uvc.freq_info.freq_array(), None);
    assert_eq!(
        uvc.freq_info.freq_range().unwrap(),
        &array![[99.5e6, 109.5e6]]
    );
}

#[test]
fn test_set_flex_spw() {
    let mut uvc = gain_uvcal();
    assert!(!uvc.is_flex_spw());
    uvc.set_flex_spw().unwrap();
    assert!(uvc.is_flex_spw());
    assert_eq!(uvc.freq_info.flex_spw_id_array(), Some(&[0; NUM_FREQS][..]));
    assert!(uvc.check(&CheckOptions::default()).is_ok());

    let mut uvc = new_uvcal(wide_band_args("gain")).unwrap();
    assert!(matches!(
        uvc.set_flex_spw(),
        Err(CheckError::FlexSpwNeedsChannels)
    ));
}

#[test]
fn test_set_telescope_params() {
    let mut uvc = gain_uvcal();
    let location = uvc.telescope_location;
    assert!(location.is_some());
    uvc.telescope_location = None;
    uvc.antenna_diameters = None;

    let warnings = uvc.set_telescope_params(false).unwrap();
    assert_eq!(uvc.telescope_location, location);
    assert_eq!(uvc.antenna_diameters, Some(vec![14.0; NUM_ANTS]));
    assert_eq!(
        warnings,
        vec![UvcalWarning::TelescopeParamsFilled {
            params: "telescope_location, antenna_diameters".to_string(),
            telescope: "HERA".to_string()
        }]
    );

    // Nothing to do.
    assert!(uvc.set_telescope_params(false).unwrap().is_empty());

    // MWA tiles don't have a single diameter.
    uvc.telescope_name = Some("mwa".to_string());
    let warnings = uvc.set_telescope_params(true).unwrap();
    assert_ne!(uvc.telescope_location, location);
    assert_eq!(uvc.antenna_diameters, Some(vec![14.0; NUM_ANTS]));
    assert_eq!(
        warnings,
        vec![UvcalWarning::TelescopeParamsFilled {
            params: "telescope_location".to_string(),
            telescope: "MWA".to_string()
        }]
    );

    uvc.telescope_name = Some("Arecibo".to_string());
    assert!(matches!(
        uvc.set_telescope_params(true),
        Err(TelescopeError::Unknown(_))
    ));
    uvc.telescope_name = None;
    assert!(matches!(
        uvc.set_telescope_params(true),
        Err(TelescopeError::NoName)
    ));
}

#[test]
fn test_select_antennas() {
    let uvc = gain_uvcal();
    let new = uvc
        .select(&Selection {
            antenna_nums: Some(vec![2, 0]),
            ..Default::default()
        })
        .unwrap();
    // The object's order is kept.
    assert_eq!(new.ant_array, vec![0, 2]);
    assert_eq!(new.nants_data, 2);
    // Telescope antennas are untouched.
    assert_eq!(new.nants_telescope, NUM_ANTS);
    let gains = new.gain_array.as_ref().unwrap();
    assert_eq!(gains.shape(), &[2, 1, 10, 12, 4]);
    assert_eq!(
        gains.index_axis(Axis(0), 1),
        uvc.gain_array.as_ref().unwrap().index_axis(Axis(0), 2)
    );

    let new = uvc
        .select(&Selection {
            antenna_names: Some(vec!["1".to_string()]),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(new.ant_array, vec![1]);

    let result = uvc.select(&Selection {
        antenna_nums: Some(vec![0]),
        antenna_names: Some(vec!["0".to_string()]),
        ..Default::default()
    });
    assert!(matches!(result, Err(SelectError::AntennaNumsAndNames)));

    let result = uvc.select(&Selection {
        antenna_names: Some(vec!["ant7".to_string()]),
        ..Default::default()
    });
    assert!(matches!(result, Err(SelectError::UnknownAntennaNames(_))));

    let result = uvc.select(&Selection {
        antenna_nums: Some(vec![7]),
        ..Default::default()
    });
    assert!(matches!(
        result,
        Err(SelectError::NotPresent {
            axis: "antenna",
            ..
        })
    ));
}

#[test]
fn test_select_times_and_jones() {
    let uvc = gain_uvcal();
    let times = test_times();
    let sel = Selection {
        times: Some(times[3..6].to_vec()),
        ..Default::default()
    }
    .with_jones_names(&["Jxx", "yy"], &uvc)
    .unwrap();
    let new = uvc.select(&sel).unwrap();
    assert_eq!(new.ntimes, 3);
    assert_eq!(new.time_array, times[3..6].to_vec());
    assert_eq!(new.jones_array, vec![-5, -6]);
    assert_eq!(new.njones, 2);
    assert_eq!(new.flag_array.as_ref().unwrap().shape(), &[3, 1, 10, 3, 2]);
    assert_eq!(new.quality_array.as_ref().unwrap().shape(), &[3, 1, 10, 3, 2]);

    let result = Selection::default().with_jones_names(&["Jqq"], &uvc);
    assert!(matches!(result, Err(SelectError::NotPresent { axis: "jones", .. })));
}

#[test]
fn test_select_frequencies() {
    let uvc = gain_uvcal();
    let freqs = test_freqs();
    // Channel indices and frequencies are combined.
    let new = uvc
        .select(&Selection {
            freq_chans: Some(vec![1, 0]),
            frequencies: Some(vec![freqs[5], freqs[1]]),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(new.nfreqs, 3);
    assert_eq!(
        new.freq_info.freq_array().unwrap(),
        &[freqs[0], freqs[1], freqs[5]]
    );
    assert_eq!(new.gain_array.as_ref().unwrap().shape(), &[3, 1, 3, 12, 4]);

    let result = uvc.select(&Selection {
        freq_chans: Some(vec![3, 10]),
        ..Default::default()
    });
    match result {
        Err(SelectError::BadChannelIndices(bad)) => assert_eq!(bad, vec![10]),
        other => panic!("Expected bad channels, got {other:?}"),
    }

    let result = uvc.select(&Selection {
        freq_chans: Some(vec![]),
        ..Default::default()
    });
    assert!(matches!(result, Err(SelectError::Empty("frequencies"))));

    // Delay flags have channels, but delays don't.
    let uvc = delay_uvcal();
    let new = uvc
        .select(&Selection {
            freq_chans: Some(vec![0, 1]),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(new.flag_array.as_ref().unwrap().shape(), &[3, 1, 2, 12, 4]);
    assert_eq!(new.delay_array.as_ref().unwrap().shape(), &[3, 1, 1, 12, 4]);
}

#[test]
fn test_select_flex_spw() {
    let uvc = flex_uvcal();
    // Windows and channels constrain each other.
    let new = uvc
        .select(&Selection {
            spws: Some(vec![2]),
            freq_chans: Some((0..7).collect()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(new.spw_array, vec![2]);
    assert_eq!(new.nspws, 1);
    assert_eq!(new.freq_info.flex_spw_id_array(), Some(&[2, 2][..]));
    assert_eq!(new.nfreqs, 2);

    // Selecting channels drops windows without any.
    let new = uvc
        .select(&Selection {
            freq_chans: Some(vec![0, 1]),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(new.spw_array, vec![1]);

    let result = uvc.select(&Selection {
        spws: Some(vec![9]),
        ..Default::default()
    });
    assert!(matches!(
        result,
        Err(SelectError::NotPresent {
            axis: "spectral window",
            ..
        })
    ));
}

#[test]
fn test_select_wide_band() {
    let uvc = new_uvcal(wide_band_args("delay")).unwrap();
    let new = uvc
        .select(&Selection {
            spws: Some(vec![0, 2]),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(new.spw_array, vec![0, 2]);
    assert_eq!(new.nspws, 2);
    assert_eq!(new.delay_array.as_ref().unwrap().shape(), &[3, 2, 12, 4]);
    assert_eq!(
        new.freq_info.freq_range().unwrap(),
        &array![[100e6, 120e6], [140e6, 160e6]]
    );

    let result = uvc.select(&Selection {
        frequencies: Some(vec![110e6]),
        ..Default::default()
    });
    assert!(matches!(result, Err(SelectError::WideBandFreqs)));
}

#[test]
fn test_select_inplace_failure_leaves_object_untouched() {
    let mut uvc = gain_uvcal();
    let result = uvc.select_inplace(&Selection {
        times: Some(vec![0.0]),
        ..Default::default()
    });
    assert!(result.is_err());
    assert_eq!(uvc, gain_uvcal());

    uvc.select_inplace(&Selection {
        antenna_nums: Some(vec![1]),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(uvc.nants_data, 1);
}

#[test]
fn test_select_mis_shaped_array_is_an_error() {
    let mut uvc = gain_uvcal();
    let gains = uvc.gain_array.take().unwrap();
    uvc.gain_array = Some(gains.select(Axis(0), &[0, 1]));
    let sel = Selection {
        antenna_nums: Some(vec![2]),
        run_check: false,
        ..Default::default()
    };
    match uvc.select(&sel) {
        Err(SelectError::Check(CheckError::BadShape {
            name,
            expected,
            actual,
            ..
        })) => {
            assert_eq!(name, "gain_array");
            assert_eq!(expected[0], 3);
            assert_eq!(actual[0], 2);
        }
        other => panic!("Expected a bad shape, got {other:?}"),
    }

    let before = uvc.clone();
    assert!(uvc.select_inplace(&sel).is_err());
    assert_eq!(uvc.gain_array, before.gain_array);
}
