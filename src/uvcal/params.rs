// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Descriptions of every parameter held by a [`UVCal`].

Each [`ParamDescriptor`] says whether its parameter must, may or must not be
present, how its shape is derived from the object's counts, what values are
acceptable and how two values are compared. Checking, selection and equality
are all driven by this table.
 */

use indexmap::IndexMap;
use itertools::Itertools;
use lazy_static::lazy_static;
use ndarray::{ArrayBase, Data, Dimension};
use num_complex::Complex64 as c64;
use strum_macros::Display;

use super::{CalStyle, CalType, CheckError, ExtraKeyword, ShapeConvention, UVCal};
use crate::{constants::*, jones::JONES_CODES};

/// One axis of a parameter, in terms of the object's counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisDim {
    NantsData,
    NantsTelescope,
    Nspws,
    Nfreqs,
    Ntimes,
    Njones,
    Fixed(usize),
}

/// The element type of a parameter.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum DType {
    Int,
    Float,
    Complex,
    Bool,
    Str,
    Map,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Required,
    Optional,
    /// Optional, but using it attracts a warning.
    Deprecated,
}

/// Whether a parameter applies to an object in its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Expected,
    Allowed,
    /// The parameter must be absent; the reason completes "must not be set
    /// ...".
    Forbidden(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
}

impl Tolerance {
    pub const DEFAULT: Tolerance = Tolerance {
        rtol: DEFAULT_RTOL,
        atol: DEFAULT_ATOL,
    };

    pub const fn absolute(atol: f64) -> Tolerance {
        Tolerance { rtol: 0.0, atol }
    }
}

#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    pub name: &'static str,
    pub dtype: DType,
    pub tier: Tier,
    pub applies: fn(&UVCal) -> Presence,
    /// `None` for scalars.
    pub form: fn(&UVCal) -> Option<Vec<AxisDim>>,
    /// `None` if the parameter is absent; scalars have an empty shape.
    pub actual_shape: fn(&UVCal) -> Option<Vec<usize>>,
    pub acceptable: Option<fn(&UVCal) -> Result<(), String>>,
    pub eq: fn(&UVCal, &UVCal, Tolerance) -> bool,
    pub tols: Tolerance,
}

impl ParamDescriptor {
    pub fn expected_shape(&self, uvc: &UVCal) -> Option<Vec<usize>> {
        (self.form)(uvc).map(|form| form.into_iter().map(|dim| uvc.axis_len(dim)).collect())
    }

    /// Absent parameters and scalars always pass.
    pub(crate) fn check_shape(&self, uvc: &UVCal) -> Result<(), CheckError> {
        if let (Some(expected), Some(actual)) = (self.expected_shape(uvc), (self.actual_shape)(uvc))
        {
            if expected != actual {
                return Err(CheckError::BadShape {
                    name: self.name,
                    dtype: self.dtype,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// Are two floats equal within a tolerance? NaNs compare equal to each
/// other.
pub(crate) fn isclose(a: f64, b: f64, tols: Tolerance) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    a == b || (a - b).abs() <= tols.atol + tols.rtol * b.abs()
}

fn eq_floats(a: &[f64], b: &[f64], tols: Tolerance) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(&a, &b)| isclose(a, b, tols))
}

fn eq_float_arrays<S1, S2, D>(a: &ArrayBase<S1, D>, b: &ArrayBase<S2, D>, tols: Tolerance) -> bool
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    a.shape() == b.shape() && a.iter().zip(b.iter()).all(|(&a, &b)| isclose(a, b, tols))
}

fn eq_complex_arrays<S1, S2, D>(
    a: &ArrayBase<S1, D>,
    b: &ArrayBase<S2, D>,
    tols: Tolerance,
) -> bool
where
    S1: Data<Elem = c64>,
    S2: Data<Elem = c64>,
    D: Dimension,
{
    a.shape() == b.shape()
        && a.iter()
            .zip(b.iter())
            .all(|(a, b)| isclose(a.re, b.re, tols) && isclose(a.im, b.im, tols))
}

fn eq_opt<T: ?Sized>(a: Option<&T>, b: Option<&T>, f: impl Fn(&T, &T) -> bool) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

fn eq_keyword(a: &ExtraKeyword, b: &ExtraKeyword, tols: Tolerance) -> bool {
    use ExtraKeyword::*;
    match (a, b) {
        (Float(a), Float(b)) => isclose(*a, *b, tols),
        (Complex(a), Complex(b)) => isclose(a.re, b.re, tols) && isclose(a.im, b.im, tols),
        (List(a), List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| eq_keyword(a, b, tols))
        }
        (Map(a), Map(b)) => eq_extra_keywords(a, b, tols),
        _ => a == b,
    }
}

/// Keys are compared case insensitively; order doesn't matter.
fn eq_extra_keywords(
    a: &IndexMap<String, ExtraKeyword>,
    b: &IndexMap<String, ExtraKeyword>,
    tols: Tolerance,
) -> bool {
    a.len() == b.len()
        && a.iter().all(|(key, value)| {
            b.iter()
                .find(|(other_key, _)| other_key.eq_ignore_ascii_case(key))
                .map_or(false, |(_, other_value)| eq_keyword(value, other_value, tols))
        })
}

fn unique<T: Eq + std::hash::Hash + std::fmt::Debug>(values: &[T]) -> Result<(), String> {
    let dups: Vec<&T> = values.iter().duplicates().collect();
    if dups.is_empty() {
        Ok(())
    } else {
        Err(format!("values must be unique, but {dups:?} are repeated"))
    }
}

fn expected(_: &UVCal) -> Presence {
    Presence::Expected
}

fn allowed(_: &UVCal) -> Presence {
    Presence::Allowed
}

fn scalar(_: &UVCal) -> Option<Vec<AxisDim>> {
    None
}

fn opt_scalar<T>(value: &Option<T>) -> Option<Vec<usize>> {
    value.as_ref().map(|_| vec![])
}

fn slice_shape<T>(values: &[T]) -> Option<Vec<usize>> {
    Some(vec![values.len()])
}

fn array_shape<S: Data, D: Dimension>(array: Option<&ArrayBase<S, D>>) -> Option<Vec<usize>> {
    array.map(|a| a.shape().to_vec())
}

fn only_with_channels(uvc: &UVCal) -> Presence {
    if uvc.is_wide_band() {
        Presence::Forbidden("for wide-band calibrations")
    } else {
        Presence::Expected
    }
}

fn quality_form(uvc: &UVCal) -> Vec<AxisDim> {
    uvc.data_form(uvc.solutions_per_channel())
}

/// A count; always present and compared exactly.
macro_rules! count {
    ($name:literal, $field:ident) => {
        ParamDescriptor {
            name: $name,
            dtype: DType::Int,
            tier: Tier::Required,
            applies: expected,
            form: scalar,
            actual_shape: |_| Some(vec![]),
            acceptable: None,
            eq: |a, b, _| a.$field == b.$field,
            tols: Tolerance::DEFAULT,
        }
    };
}

/// An optional string, compared exactly.
macro_rules! opt_string {
    ($name:literal, $field:ident, $tier:expr, $applies:expr) => {
        ParamDescriptor {
            name: $name,
            dtype: DType::Str,
            tier: $tier,
            applies: $applies,
            form: scalar,
            actual_shape: |u| opt_scalar(&u.$field),
            acceptable: None,
            eq: |a, b, _| a.$field == b.$field,
            tols: Tolerance::DEFAULT,
        }
    };
}

fn sky_only(uvc: &UVCal) -> Presence {
    if uvc.cal_style == Some(CalStyle::Sky) {
        Presence::Expected
    } else {
        Presence::Allowed
    }
}

lazy_static! {
    /// Every parameter of a [`UVCal`].
    pub static ref PARAMETERS: Vec<ParamDescriptor> = vec![
        count!("nants_data", nants_data),
        count!("nants_telescope", nants_telescope),
        count!("nspws", nspws),
        count!("nfreqs", nfreqs),
        count!("ntimes", ntimes),
        count!("njones", njones),
        ParamDescriptor {
            name: "cal_type",
            dtype: DType::Str,
            tier: Tier::Required,
            applies: expected,
            form: scalar,
            actual_shape: |u| (u.cal_type != CalType::Unknown).then(Vec::new),
            acceptable: None,
            eq: |a, b, _| a.cal_type == b.cal_type,
            tols: Tolerance::DEFAULT,
        },
        ParamDescriptor {
            name: "cal_style",
            dtype: DType::Str,
            tier: Tier::Required,
            applies: expected,
            form: scalar,
            actual_shape: |u| opt_scalar(&u.cal_style),
            acceptable: None,
            eq: |a, b, _| a.cal_style == b.cal_style,
            tols: Tolerance::DEFAULT,
        },
        opt_string!("ref_antenna_name", ref_antenna_name, Tier::Required, sky_only),
        opt_string!("sky_catalog", sky_catalog, Tier::Required, sky_only),
        opt_string!("sky_field", sky_field, Tier::Required, sky_only),
        ParamDescriptor {
            name: "gain_convention",
            dtype: DType::Str,
            tier: Tier::Required,
            applies: expected,
            form: scalar,
            actual_shape: |u| opt_scalar(&u.gain_convention),
            acceptable: None,
            eq: |a, b, _| a.gain_convention == b.gain_convention,
            tols: Tolerance::DEFAULT,
        },
        ParamDescriptor {
            name: "x_orientation",
            dtype: DType::Str,
            tier: Tier::Required,
            applies: expected,
            form: scalar,
            actual_shape: |u| opt_scalar(&u.x_orientation),
            acceptable: None,
            eq: |a, b, _| a.x_orientation == b.x_orientation,
            tols: Tolerance::DEFAULT,
        },
        opt_string!("telescope_name", telescope_name, Tier::Required, expected),
        ParamDescriptor {
            name: "telescope_location",
            dtype: DType::Float,
            tier: Tier::Optional,
            applies: allowed,
            form: |_| Some(vec![AxisDim::Fixed(3)]),
            actual_shape: |u| u.telescope_location.map(|l| vec![l.len()]),
            acceptable: None,
            eq: |a, b, t| {
                eq_opt(a.telescope_location.as_ref(), b.telescope_location.as_ref(), |x, y| {
                    eq_floats(x, y, t)
                })
            },
            tols: Tolerance::absolute(POSITION_ATOL),
        },
        ParamDescriptor {
            name: "antenna_names",
            dtype: DType::Str,
            tier: Tier::Required,
            applies: expected,
            form: |_| Some(vec![AxisDim::NantsTelescope]),
            actual_shape: |u| slice_shape(&u.antenna_names),
            acceptable: Some(|u| unique(&u.antenna_names)),
            eq: |a, b, _| a.antenna_names == b.antenna_names,
            tols: Tolerance::DEFAULT,
        },
        ParamDescriptor {
            name: "antenna_numbers",
            dtype: DType::Int,
            tier: Tier::Required,
            applies: expected,
            form: |_| Some(vec![AxisDim::NantsTelescope]),
            actual_shape: |u| slice_shape(&u.antenna_numbers),
            acceptable: Some(|u| unique(&u.antenna_numbers)),
            eq: |a, b, _| a.antenna_numbers == b.antenna_numbers,
            tols: Tolerance::DEFAULT,
        },
        ParamDescriptor {
            name: "antenna_positions",
            dtype: DType::Float,
            tier: Tier::Optional,
            applies: allowed,
            form: |_| Some(vec![AxisDim::NantsTelescope, AxisDim::Fixed(3)]),
            actual_shape: |u| array_shape(u.antenna_positions.as_ref()),
            acceptable: None,
            eq: |a, b, t| {
                eq_opt(a.antenna_positions.as_ref(), b.antenna_positions.as_ref(), |x, y| {
                    eq_float_arrays(x, y, t)
                })
            },
            tols: Tolerance::absolute(POSITION_ATOL),
        },
        ParamDescriptor {
            name: "antenna_diameters",
            dtype: DType::Float,
            tier: Tier::Optional,
            applies: allowed,
            form: |_| Some(vec![AxisDim::NantsTelescope]),
            actual_shape: |u| u.antenna_diameters.as_deref().and_then(slice_shape),
            acceptable: Some(|u| match &u.antenna_diameters {
                Some(d) if d.iter().any(|&d| d <= 0.0) => {
                    Err("antenna diameters must be positive".to_string())
                }
                _ => Ok(()),
            }),
            eq: |a, b, t| {
                eq_opt(a.antenna_diameters.as_deref(), b.antenna_diameters.as_deref(), |x, y| {
                    eq_floats(x, y, t)
                })
            },
            tols: Tolerance::absolute(POSITION_ATOL),
        },
        ParamDescriptor {
            name: "ant_array",
            dtype: DType::Int,
            tier: Tier::Required,
            applies: expected,
            form: |_| Some(vec![AxisDim::NantsData]),
            actual_shape: |u| slice_shape(&u.ant_array),
            acceptable: Some(|u| unique(&u.ant_array)),
            eq: |a, b, _| a.ant_array == b.ant_array,
            tols: Tolerance::DEFAULT,
        },
        ParamDescriptor {
            name: "spw_array",
            dtype: DType::Int,
            tier: Tier::Required,
            applies: expected,
            form: |_| Some(vec![AxisDim::Nspws]),
            actual_shape: |u| slice_shape(&u.spw_array),
            acceptable: Some(|u| unique(&u.spw_array)),
            eq: |a, b, _| a.spw_array == b.spw_array,
            tols: Tolerance::DEFAULT,
        },
        ParamDescriptor {
            name: "freq_array",
            dtype: DType::Float,
            tier: Tier::Required,
            applies: only_with_channels,
            form: |_| Some(vec![AxisDim::Nfreqs]),
            actual_shape: |u| u.freq_info.freq_array().and_then(slice_shape),
            acceptable: None,
            eq: |a, b, t| {
                eq_opt(a.freq_info.freq_array(), b.freq_info.freq_array(), |x, y| {
                    eq_floats(x, y, t)
                })
            },
            tols: Tolerance::absolute(FREQ_ATOL),
        },
        ParamDescriptor {
            name: "channel_width",
            dtype: DType::Float,
            tier: Tier::Required,
            applies: only_with_channels,
            form: |_| Some(vec![AxisDim::Nfreqs]),
            actual_shape: |u| u.freq_info.channel_width().and_then(slice_shape),
            acceptable: Some(|u| {
                let widths = u.freq_info.channel_width().unwrap_or_default();
                if widths.iter().any(|&w| w <= 0.0) {
                    return Err("channel widths must be positive".to_string());
                }
                if !u.is_flex_spw() {
                    if let Some(&first) = widths.first() {
                        let tols = Tolerance::absolute(FREQ_ATOL);
                        if widths.iter().any(|&w| !isclose(w, first, tols)) {
                            return Err(
                                "channel widths must all be the same unless flexible spectral windows are in use"
                                    .to_string(),
                            );
                        }
                    }
                }
                Ok(())
            }),
            eq: |a, b, t| {
                eq_opt(a.freq_info.channel_width(), b.freq_info.channel_width(), |x, y| {
                    eq_floats(x, y, t)
                })
            },
            tols: Tolerance::absolute(FREQ_ATOL),
        },
        ParamDescriptor {
            name: "flex_spw_id_array",
            dtype: DType::Int,
            tier: Tier::Required,
            applies: allowed,
            form: |_| Some(vec![AxisDim::Nfreqs]),
            actual_shape: |u| u.freq_info.flex_spw_id_array().and_then(slice_shape),
            acceptable: None,
            eq: |a, b, _| a.freq_info.flex_spw_id_array() == b.freq_info.flex_spw_id_array(),
            tols: Tolerance::DEFAULT,
        },
        ParamDescriptor {
            name: "freq_range",
            dtype: DType::Float,
            tier: Tier::Required,
            applies: |u| {
                if u.is_wide_band()
                    || (u.shapes == ShapeConvention::Legacy && u.cal_type == CalType::Delay)
                {
                    Presence::Expected
                } else {
                    Presence::Allowed
                }
            },
            form: |_| Some(vec![AxisDim::Nspws, AxisDim::Fixed(2)]),
            actual_shape: |u| array_shape(u.freq_info.freq_range()),
            acceptable: Some(|u| match u.freq_info.freq_range() {
                Some(r) if r.outer_iter().any(|row| !(row[0] < row[1])) => Err(
                    "the low frequency of each spectral window must be less than its high frequency"
                        .to_string(),
                ),
                _ => Ok(()),
            }),
            eq: |a, b, t| {
                eq_opt(a.freq_info.freq_range(), b.freq_info.freq_range(), |x, y| {
                    eq_float_arrays(x, y, t)
                })
            },
            tols: Tolerance::absolute(FREQ_ATOL),
        },
        ParamDescriptor {
            name: "time_array",
            dtype: DType::Float,
            tier: Tier::Required,
            applies: expected,
            form: |_| Some(vec![AxisDim::Ntimes]),
            actual_shape: |u| slice_shape(&u.time_array),
            acceptable: None,
            eq: |a, b, t| eq_floats(&a.time_array, &b.time_array, t),
            tols: Tolerance::absolute(TIME_ATOL),
        },
        ParamDescriptor {
            name: "integration_time",
            dtype: DType::Float,
            tier: Tier::Required,
            applies: expected,
            form: scalar,
            actual_shape: |u| opt_scalar(&u.integration_time),
            acceptable: Some(|u| match u.integration_time {
                Some(t) if !(t > 0.0) => Err("integration_time must be positive".to_string()),
                _ => Ok(()),
            }),
            eq: |a, b, t| {
                eq_opt(a.integration_time.as_ref(), b.integration_time.as_ref(), |x, y| {
                    isclose(*x, *y, t)
                })
            },
            tols: Tolerance::absolute(1e-3),
        },
        ParamDescriptor {
            name: "time_range",
            dtype: DType::Float,
            tier: Tier::Optional,
            applies: allowed,
            form: |_| Some(vec![AxisDim::Fixed(2)]),
            actual_shape: |u| u.time_range.map(|r| vec![r.len()]),
            acceptable: Some(|u| match u.time_range {
                Some([start, end]) if !(start < end) => {
                    Err("the start time must be before the end time".to_string())
                }
                _ => Ok(()),
            }),
            eq: |a, b, t| {
                eq_opt(a.time_range.as_ref(), b.time_range.as_ref(), |x, y| eq_floats(x, y, t))
            },
            tols: Tolerance::absolute(TIME_ATOL),
        },
        ParamDescriptor {
            name: "jones_array",
            dtype: DType::Int,
            tier: Tier::Required,
            applies: expected,
            form: |_| Some(vec![AxisDim::Njones]),
            actual_shape: |u| slice_shape(&u.jones_array),
            acceptable: Some(|u| {
                let bad: Vec<i32> =
                    u.jones_array.iter().copied().filter(|j| !JONES_CODES.contains(j)).collect();
                if !bad.is_empty() {
                    return Err(format!("{bad:?} are not valid Jones codes (-8 to -1)"));
                }
                unique(&u.jones_array)
            }),
            eq: |a, b, _| a.jones_array == b.jones_array,
            tols: Tolerance::DEFAULT,
        },
        ParamDescriptor {
            name: "gain_array",
            dtype: DType::Complex,
            tier: Tier::Required,
            applies: |u| {
                if u.cal_type == CalType::Gain {
                    Presence::Expected
                } else {
                    Presence::Forbidden("unless cal_type is gain")
                }
            },
            form: |u| Some(u.data_form(true)),
            actual_shape: |u| array_shape(u.gain_array.as_ref()),
            acceptable: None,
            eq: |a, b, t| {
                eq_opt(a.gain_array.as_ref(), b.gain_array.as_ref(), |x, y| {
                    eq_complex_arrays(x, y, t)
                })
            },
            tols: Tolerance::DEFAULT,
        },
        ParamDescriptor {
            name: "delay_array",
            dtype: DType::Float,
            tier: Tier::Required,
            applies: |u| {
                if u.cal_type == CalType::Delay {
                    Presence::Expected
                } else {
                    Presence::Forbidden("unless cal_type is delay")
                }
            },
            form: |u| Some(u.data_form(false)),
            actual_shape: |u| array_shape(u.delay_array.as_ref()),
            acceptable: None,
            eq: |a, b, t| {
                eq_opt(a.delay_array.as_ref(), b.delay_array.as_ref(), |x, y| {
                    eq_float_arrays(x, y, t)
                })
            },
            tols: Tolerance { rtol: DEFAULT_RTOL, atol: 1e-15 },
        },
        ParamDescriptor {
            name: "flag_array",
            dtype: DType::Bool,
            tier: Tier::Required,
            applies: expected,
            form: |u| Some(u.data_form(true)),
            actual_shape: |u| array_shape(u.flag_array.as_ref()),
            acceptable: None,
            eq: |a, b, _| a.flag_array == b.flag_array,
            tols: Tolerance::DEFAULT,
        },
        ParamDescriptor {
            name: "quality_array",
            dtype: DType::Float,
            tier: Tier::Required,
            applies: expected,
            form: |u| Some(quality_form(u)),
            actual_shape: |u| array_shape(u.quality_array.as_ref()),
            acceptable: None,
            eq: |a, b, t| {
                eq_opt(a.quality_array.as_ref(), b.quality_array.as_ref(), |x, y| {
                    eq_float_arrays(x, y, t)
                })
            },
            tols: Tolerance::DEFAULT,
        },
        ParamDescriptor {
            name: "total_quality_array",
            dtype: DType::Float,
            tier: Tier::Optional,
            applies: allowed,
            // No antenna axis.
            form: |u| Some(quality_form(u).split_off(1)),
            actual_shape: |u| array_shape(u.total_quality_array.as_ref()),
            acceptable: None,
            eq: |a, b, t| {
                eq_opt(a.total_quality_array.as_ref(), b.total_quality_array.as_ref(), |x, y| {
                    eq_float_arrays(x, y, t)
                })
            },
            tols: Tolerance::DEFAULT,
        },
        ParamDescriptor {
            name: "input_flag_array",
            dtype: DType::Bool,
            tier: Tier::Deprecated,
            applies: allowed,
            form: |u| Some(u.data_form(true)),
            actual_shape: |u| array_shape(u.input_flag_array.as_ref()),
            acceptable: None,
            eq: |a, b, _| a.input_flag_array == b.input_flag_array,
            tols: Tolerance::DEFAULT,
        },
        ParamDescriptor {
            name: "history",
            dtype: DType::Str,
            tier: Tier::Required,
            applies: expected,
            form: scalar,
            actual_shape: |_| Some(vec![]),
            acceptable: None,
            eq: |a, b, _| a.history == b.history,
            tols: Tolerance::DEFAULT,
        },
        opt_string!("observer", observer, Tier::Optional, allowed),
        opt_string!("git_origin_cal", git_origin_cal, Tier::Optional, allowed),
        opt_string!("git_hash_cal", git_hash_cal, Tier::Optional, allowed),
        ParamDescriptor {
            name: "extra_keywords",
            dtype: DType::Map,
            tier: Tier::Optional,
            applies: allowed,
            form: scalar,
            actual_shape: |u| (!u.extra_keywords.is_empty()).then(Vec::new),
            acceptable: None,
            eq: |a, b, t| eq_extra_keywords(&a.extra_keywords, &b.extra_keywords, t),
            tols: Tolerance::DEFAULT,
        },
    ];
}
