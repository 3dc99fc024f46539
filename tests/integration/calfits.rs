// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tempfile::TempDir;

use uvcal::{
    CalfitsReadError, CalfitsWriteError, ExtraKeyword, NewUvcalArgs, ReadOptions, Selection,
    ShapeConvention, UVCal, UvcalError, WriteOptions,
};

use super::*;

#[test]
fn test_select_write_read() {
    let uvc = get_uvcal();
    // x points north, so "Jnn" is xx.
    assert_eq!(uvc.jones_array, vec![-5, -6]);

    let selected = uvc
        .select(&Selection {
            antenna_names: Some(vec!["HH10".to_string(), "HH40".to_string()]),
            times: Some(uvc.time_array[1..4].to_vec()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(selected.ant_array, vec![10, 40]);
    assert_eq!(selected.ntimes, 3);

    let tmp_dir = TempDir::new().unwrap();
    let file = tmp_dir.path().join("selected.calfits");
    selected
        .write_calfits(&file, &WriteOptions::default())
        .unwrap();

    let (read, _) = UVCal::from_calfits(&file, &ReadOptions::default()).unwrap();
    assert_eq!(read, selected);
    // All telescope antennas are kept.
    assert_eq!(read.antenna_names.len(), 6);
    assert_eq!(read.observer.as_deref(), Some("integration tests"));

    // Reading into an existing object replaces it.
    let mut other = get_uvcal();
    let opts = ReadOptions {
        shapes: ShapeConvention::Future,
        ..Default::default()
    };
    other.read_calfits(&file, &opts).unwrap();
    assert_eq!(other.shapes, ShapeConvention::Future);
    assert_eq!(other.nants_data, 2);
}

#[test]
fn test_errors_are_wrapped() {
    let tmp_dir = TempDir::new().unwrap();

    let result = UVCal::from_calfits(tmp_dir.path().join("nothing.calfits"), &ReadOptions::default());
    assert!(matches!(
        result,
        Err(UvcalError::CalfitsRead(CalfitsReadError::Fits(_)))
    ));

    let mut uvc = get_uvcal();
    uvc.extra_keywords
        .insert("SOURCES".to_string(), ExtraKeyword::List(vec![]));
    let result = uvc.write_calfits(tmp_dir.path().join("list.calfits"), &WriteOptions::default());
    assert!(matches!(
        result,
        Err(UvcalError::CalfitsWrite(CalfitsWriteError::ExtraKeywordType { .. }))
    ));
}

#[test]
fn test_wide_band_delay_from_arg_file() {
    let tmp_dir = TempDir::new().unwrap();
    let arg_file = tmp_dir.path().join("args.json");
    std::fs::write(
        &arg_file,
        r#"{
            "freq_range": [[1.5e8, 1.6e8], [1.6e8, 1.7e8]],
            "time_array": [2459900.25, 2459900.26],
            "antenna_positions": {"1": [0.0, 0.0, 0.0], "2": [0.0, 14.6, 0.0]},
            "telescope_name": "HERA",
            "cal_type": "delay",
            "cal_style": "redundant",
            "gain_convention": "multiply",
            "x_orientation": "east",
            "jones_array": "Jee",
            "empty": true
        }"#,
    )
    .unwrap();
    let args = NewUvcalArgs::from_arg_file(&arg_file).unwrap();
    let mut uvc = uvcal::new_uvcal(args).unwrap();
    uvc.delay_array.as_mut().unwrap().fill(3.5e-9);

    let file = tmp_dir.path().join("delay.calfits");
    uvc.write_calfits(&file, &WriteOptions::default()).unwrap();

    let result = UVCal::from_calfits(&file, &ReadOptions::default());
    assert!(matches!(
        result,
        Err(UvcalError::CalfitsRead(CalfitsReadError::WideBandNeedsFuture))
    ));
    let opts = ReadOptions {
        shapes: ShapeConvention::Future,
        ..Default::default()
    };
    let (read, _) = UVCal::from_calfits(&file, &opts).unwrap();
    assert_eq!(read, uvc);

    // Writing over the file needs permission.
    let result = read.write_calfits(&file, &WriteOptions::default());
    assert!(matches!(
        result,
        Err(UvcalError::CalfitsWrite(CalfitsWriteError::FileExists(_)))
    ));
    let opts = WriteOptions {
        clobber: true,
        ..Default::default()
    };
    read.write_calfits(&file, &opts).unwrap();
}
