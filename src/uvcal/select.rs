// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Down-selection of antennas, spectral windows, frequencies, times and
//! Jones terms.

use std::fmt::Debug;

use itertools::Itertools;
use log::debug;
use ndarray::{Array2, ArrayD, Axis};

use super::{
    params::{isclose, AxisDim, Tolerance, PARAMETERS},
    CheckOptions, FreqInfo, SelectError, UVCal,
};
use crate::{
    constants::{FREQ_ATOL, TIME_ATOL},
    jones::jones_str_to_num,
};

/// What to keep. Criteria on different axes are combined; unset criteria keep
/// everything on their axis.
#[derive(Debug, Clone)]
pub struct Selection {
    pub antenna_nums: Option<Vec<i32>>,
    pub antenna_names: Option<Vec<String>>,
    pub spws: Option<Vec<i32>>,
    /// Channel indices.
    pub freq_chans: Option<Vec<usize>>,
    /// \[Hz\]
    pub frequencies: Option<Vec<f64>>,
    /// Julian dates.
    pub times: Option<Vec<f64>>,
    pub jones: Option<Vec<i32>>,

    /// Check the selected object.
    pub run_check: bool,
    pub check: CheckOptions,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            antenna_nums: None,
            antenna_names: None,
            spws: None,
            freq_chans: None,
            frequencies: None,
            times: None,
            jones: None,
            run_check: true,
            check: CheckOptions::default(),
        }
    }
}

impl Selection {
    /// Select Jones terms by name (e.g. "Jxx" or "Jee").
    pub fn with_jones_names(
        mut self,
        names: &[&str],
        uvc: &UVCal,
    ) -> Result<Selection, SelectError> {
        let mut codes = vec![];
        for name in names {
            match jones_str_to_num(name, uvc.x_orientation) {
                Some(code) => codes.push(code),
                None => {
                    return Err(SelectError::NotPresent {
                        axis: "jones",
                        values: format!("{name:?}"),
                    })
                }
            }
        }
        self.jones = Some(codes);
        Ok(self)
    }
}

/// Indices to keep along each axis.
#[derive(Debug, Default)]
struct AxisPicks {
    ants: Option<Vec<usize>>,
    spws: Option<Vec<usize>>,
    freqs: Option<Vec<usize>>,
    times: Option<Vec<usize>>,
    jones: Option<Vec<usize>>,
}

impl AxisPicks {
    fn get(&self, dim: AxisDim) -> Option<&[usize]> {
        match dim {
            AxisDim::NantsData => self.ants.as_deref(),
            AxisDim::Nspws => self.spws.as_deref(),
            AxisDim::Nfreqs => self.freqs.as_deref(),
            AxisDim::Ntimes => self.times.as_deref(),
            AxisDim::Njones => self.jones.as_deref(),
            AxisDim::NantsTelescope | AxisDim::Fixed(_) => None,
        }
    }
}

/// The positions of `available` that match any of `wanted`. Every wanted
/// value must be available.
fn indices_of<T: Debug>(
    axis: &'static str,
    available: &[T],
    wanted: &[T],
    matches: impl Fn(&T, &T) -> bool,
) -> Result<Vec<usize>, SelectError> {
    let missing: Vec<&T> = wanted
        .iter()
        .filter(|w| !available.iter().any(|a| matches(a, w)))
        .collect();
    if !missing.is_empty() {
        return Err(SelectError::NotPresent {
            axis,
            values: format!("{missing:?}"),
        });
    }
    Ok(available
        .iter()
        .positions(|a| wanted.iter().any(|w| matches(a, w)))
        .collect())
}

fn pick<T: Clone>(values: &[T], indices: Option<&[usize]>) -> Vec<T> {
    match indices {
        Some(indices) => indices.iter().map(|&i| values[i].clone()).collect(),
        None => values.to_vec(),
    }
}

fn pick_rows(values: &Array2<f64>, indices: Option<&[usize]>) -> Array2<f64> {
    match indices {
        Some(indices) => values.select(Axis(0), indices),
        None => values.clone(),
    }
}

/// Slice an array along every axis of its form that has a selection.
fn select_axes<T: Clone>(array: &ArrayD<T>, form: &[AxisDim], picks: &AxisPicks) -> ArrayD<T> {
    let mut out = array.clone();
    for (i_axis, &dim) in form.iter().enumerate() {
        if let Some(indices) = picks.get(dim) {
            out = out.select(Axis(i_axis), indices);
        }
    }
    out
}

impl UVCal {
    fn param_form(&self, name: &str) -> Vec<AxisDim> {
        PARAMETERS
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| (p.form)(self))
            .unwrap_or_default()
    }

    fn select_picks(&self, sel: &Selection) -> Result<AxisPicks, SelectError> {
        let mut picks = AxisPicks::default();

        let ant_nums = match (&sel.antenna_nums, &sel.antenna_names) {
            (Some(_), Some(_)) => return Err(SelectError::AntennaNumsAndNames),
            (Some(nums), None) => Some(nums.clone()),
            (None, Some(names)) => {
                let mut nums = vec![];
                let mut unknown = vec![];
                for name in names {
                    match self.antenna_names.iter().position(|n| n == name) {
                        Some(i) => nums.push(self.antenna_numbers[i]),
                        None => unknown.push(name.clone()),
                    }
                }
                if !unknown.is_empty() {
                    return Err(SelectError::UnknownAntennaNames(unknown));
                }
                Some(nums)
            }
            (None, None) => None,
        };
        if let Some(nums) = ant_nums {
            picks.ants = Some(indices_of("antenna", &self.ant_array, &nums, |a, b| a == b)?);
        }

        if let Some(times) = &sel.times {
            let tols = Tolerance::absolute(TIME_ATOL);
            picks.times = Some(indices_of("time", &self.time_array, times, |a, b| {
                isclose(*a, *b, tols)
            })?);
        }

        if let Some(jones) = &sel.jones {
            picks.jones = Some(indices_of("jones", &self.jones_array, jones, |a, b| a == b)?);
        }

        let spw_inds = match &sel.spws {
            Some(spws) => Some(indices_of("spectral window", &self.spw_array, spws, |a, b| {
                a == b
            })?),
            None => None,
        };

        match &self.freq_info {
            FreqInfo::WideBand { .. } => {
                if sel.freq_chans.is_some() || sel.frequencies.is_some() {
                    return Err(SelectError::WideBandFreqs);
                }
                picks.spws = spw_inds;
            }

            FreqInfo::Channels(c) => {
                // Channel indices and frequencies are combined.
                let mut chans: Option<Vec<usize>> = None;
                if let Some(freq_chans) = &sel.freq_chans {
                    let bad: Vec<usize> = freq_chans
                        .iter()
                        .copied()
                        .filter(|&i| i >= c.freq_array.len())
                        .collect();
                    if !bad.is_empty() {
                        return Err(SelectError::BadChannelIndices(bad));
                    }
                    chans = Some(freq_chans.clone());
                }
                if let Some(freqs) = &sel.frequencies {
                    let tols = Tolerance::absolute(FREQ_ATOL);
                    let inds = indices_of("frequency", &c.freq_array, freqs, |a, b| {
                        isclose(*a, *b, tols)
                    })?;
                    chans.get_or_insert_with(Vec::new).extend(inds);
                }
                let mut chans: Option<Vec<usize>> =
                    chans.map(|c| c.into_iter().sorted_unstable().dedup().collect());

                match &c.flex_spw_id_array {
                    Some(ids) => {
                        // Windows and channels constrain each other.
                        if let Some(spw_inds) = &spw_inds {
                            let spws: Vec<i32> =
                                spw_inds.iter().map(|&i| self.spw_array[i]).collect();
                            let in_spws = ids.iter().positions(|id| spws.contains(id));
                            chans = Some(match chans {
                                Some(chans) => in_spws.filter(|i| chans.contains(i)).collect(),
                                None => in_spws.collect(),
                            });
                        }
                        if let Some(chans) = &chans {
                            let kept_ids: Vec<i32> = chans.iter().map(|&i| ids[i]).collect();
                            picks.spws =
                                Some(self.spw_array.iter().positions(|s| kept_ids.contains(s)).collect());
                        }
                    }
                    None => picks.spws = spw_inds,
                }
                picks.freqs = chans;
            }
        }

        for (axis, indices) in [
            ("antennas", &picks.ants),
            ("spectral windows", &picks.spws),
            ("frequencies", &picks.freqs),
            ("times", &picks.times),
            ("jones terms", &picks.jones),
        ] {
            if indices.as_ref().map_or(false, |i| i.is_empty()) {
                return Err(SelectError::Empty(axis));
            }
        }

        Ok(picks)
    }

    /// Return a new object containing only the selected data.
    pub fn select(&self, sel: &Selection) -> Result<UVCal, SelectError> {
        // Slicing relies on every array matching the counts.
        self.check_shapes()?;
        let picks = self.select_picks(sel)?;
        debug!("Selecting with {picks:?}");

        let mut new = self.clone();
        macro_rules! select_array {
            ($field:ident) => {
                new.$field = self
                    .$field
                    .as_ref()
                    .map(|a| select_axes(a, &self.param_form(stringify!($field)), &picks));
            };
        }
        select_array!(gain_array);
        select_array!(delay_array);
        select_array!(flag_array);
        select_array!(quality_array);
        select_array!(total_quality_array);
        select_array!(input_flag_array);

        new.ant_array = pick(&self.ant_array, picks.ants.as_deref());
        new.spw_array = pick(&self.spw_array, picks.spws.as_deref());
        new.time_array = pick(&self.time_array, picks.times.as_deref());
        new.jones_array = pick(&self.jones_array, picks.jones.as_deref());
        new.freq_info = match &self.freq_info {
            FreqInfo::WideBand { freq_range } => FreqInfo::WideBand {
                freq_range: pick_rows(freq_range, picks.spws.as_deref()),
            },
            FreqInfo::Channels(c) => {
                let freqs = picks.freqs.as_deref();
                let mut c = c.clone();
                c.freq_array = pick(&c.freq_array, freqs);
                c.channel_width = pick(&c.channel_width, freqs);
                c.flex_spw_id_array = c.flex_spw_id_array.map(|ids| pick(&ids, freqs));
                c.freq_range = c
                    .freq_range
                    .map(|r| pick_rows(&r, picks.spws.as_deref()));
                FreqInfo::Channels(c)
            }
        };

        new.nants_data = new.ant_array.len();
        new.nspws = new.spw_array.len();
        new.ntimes = new.time_array.len();
        new.njones = new.jones_array.len();
        if let Some(freqs) = new.freq_info.freq_array() {
            new.nfreqs = freqs.len();
        }

        if sel.run_check {
            new.check(&sel.check)?;
        }
        Ok(new)
    }

    /// Select in place. On failure, this object is left untouched.
    pub fn select_inplace(&mut self, sel: &Selection) -> Result<(), SelectError> {
        *self = self.select(sel)?;
        Ok(())
    }
}
