// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Jones-term codes.
//!
//! Jones terms are identified by negative integers, as for visibility
//! polarisations: -1 to -4 are the circular terms (rr, ll, rl, lr) and -5 to
//! -8 are the linear terms (xx, yy, xy, yx).

use std::ops::RangeInclusive;

use strum_macros::{Display, EnumIter, EnumString};

use crate::uvcal::XOrientation;

/// All valid Jones codes.
pub const JONES_CODES: RangeInclusive<i32> = -8..=-1;

pub const LINEAR_JONES: [i32; 4] = [-5, -6, -7, -8];
pub const CIRCULAR_JONES: [i32; 4] = [-1, -2, -3, -4];

/// Named sets of Jones terms.
#[derive(Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum JonesConvention {
    Linear,
    Circular,
}

impl JonesConvention {
    pub fn codes(self) -> [i32; 4] {
        match self {
            JonesConvention::Linear => LINEAR_JONES,
            JonesConvention::Circular => CIRCULAR_JONES,
        }
    }
}

/// Convert a Jones name (e.g. "Jxx", "yy", "Jee") to its code. Physical names
/// ("e" and "n") are only understood when the x orientation is known.
pub fn jones_str_to_num(name: &str, x_orientation: Option<XOrientation>) -> Option<i32> {
    let lower = name.trim().to_lowercase();
    let stripped = lower.strip_prefix('j').unwrap_or(&lower);
    let code = match stripped {
        "rr" => -1,
        "ll" => -2,
        "rl" => -3,
        "lr" => -4,
        "xx" => -5,
        "yy" => -6,
        "xy" => -7,
        "yx" => -8,
        _ => {
            // Map the physical directions onto x and y.
            let (x, y) = match x_orientation? {
                XOrientation::East => ('e', 'n'),
                XOrientation::North => ('n', 'e'),
            };
            let mut chars = stripped.chars();
            let (a, b) = (chars.next()?, chars.next()?);
            if chars.next().is_some() {
                return None;
            }
            let to_xy = |c: char| {
                if c == x {
                    Some('x')
                } else if c == y {
                    Some('y')
                } else {
                    None
                }
            };
            let linear: String = [to_xy(a)?, to_xy(b)?].iter().collect();
            return jones_str_to_num(&linear, None);
        }
    };
    Some(code)
}

/// Convert a Jones code to its name, e.g. -5 to "Jxx". With a known x
/// orientation, linear terms are given their physical names (e.g. "Jee").
pub fn jones_num_to_str(code: i32, x_orientation: Option<XOrientation>) -> Option<String> {
    let name = match code {
        -1 => "rr",
        -2 => "ll",
        -3 => "rl",
        -4 => "lr",
        -5 => "xx",
        -6 => "yy",
        -7 => "xy",
        -8 => "yx",
        _ => return None,
    };
    let name = match (x_orientation, code) {
        (Some(orientation), -8..=-5) => {
            let (x, y) = match orientation {
                XOrientation::East => ('e', 'n'),
                XOrientation::North => ('n', 'e'),
            };
            name.chars()
                .map(|c| if c == 'x' { x } else { y })
                .collect()
        }
        _ => name.to_string(),
    };
    Some(format!("J{name}"))
}
