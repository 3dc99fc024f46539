// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use itertools::Itertools;

use uvcal::{Presence, Tier, PARAMETERS};

use super::*;

#[test]
fn test_parameter_table() {
    assert!(PARAMETERS.iter().map(|p| p.name).duplicates().next().is_none());
    for name in [
        "gain_array",
        "delay_array",
        "flag_array",
        "quality_array",
        "total_quality_array",
        "input_flag_array",
        "freq_range",
        "extra_keywords",
    ] {
        assert!(PARAMETERS.iter().any(|p| p.name == name), "{name}");
    }
    let input_flags = PARAMETERS
        .iter()
        .find(|p| p.name == "input_flag_array")
        .unwrap();
    assert_eq!(input_flags.tier, Tier::Deprecated);
}

#[test]
fn test_parameters_describe_a_valid_object() {
    let uvc = get_uvcal();
    for p in PARAMETERS.iter() {
        let presence = (p.applies)(&uvc);
        let actual = (p.actual_shape)(&uvc);
        if presence == Presence::Expected {
            assert!(actual.is_some(), "{} is missing", p.name);
        }
        if let (Some(expected), Some(actual)) = (p.expected_shape(&uvc), actual) {
            assert_eq!(expected, actual, "{}", p.name);
        }
        assert!((p.eq)(&uvc, &uvc, p.tols), "{}", p.name);
    }
}
