// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Conversion between the legacy and future array shapes.

use ndarray::{ArrayD, Axis};

use super::{push_warning, CalType, CheckError, FreqInfo, ShapeConvention, UVCal, UvcalWarning};

/// Remove an axis of length 1.
fn drop_unit_axis<T>(array: ArrayD<T>, axis: usize) -> Result<ArrayD<T>, CheckError> {
    if array.shape().get(axis) != Some(&1) {
        return Err(CheckError::ShapeConversion(
            "an axis dropped by future array shapes doesn't have length 1 (multiple spectral windows need flexible spectral windows)",
        ));
    }
    Ok(array.index_axis_move(Axis(axis), 0))
}

fn map_opt<T>(
    array: &mut Option<ArrayD<T>>,
    f: impl Fn(ArrayD<T>) -> Result<ArrayD<T>, CheckError>,
) -> Result<(), CheckError> {
    if let Some(a) = array.take() {
        *array = Some(f(a)?);
    }
    Ok(())
}

/// Combine flags over the frequency axis; a solution is flagged only if all of
/// its channels are.
fn collapse_flag_freqs(flags: ArrayD<bool>) -> ArrayD<bool> {
    flags.map_axis(Axis(2), |lane| lane.iter().all(|&f| f))
}

impl UVCal {
    /// Switch to future array shapes. Delay-type objects become wide-band;
    /// their flags lose the frequency axis.
    pub fn use_future_array_shapes(&mut self) -> Result<Vec<UvcalWarning>, CheckError> {
        let mut warnings = vec![];
        if self.shapes == ShapeConvention::Future {
            return Ok(warnings);
        }

        // Work on a copy so that a failure leaves this object untouched.
        let mut new = self.clone();
        if new.cal_type == CalType::Delay {
            let freq_range = match new.freq_info.freq_range() {
                Some(r) => r.clone(),
                None => new.derived_freq_range(),
            };
            map_opt(&mut new.delay_array, |a| drop_unit_axis(a, 2))?;
            map_opt(&mut new.quality_array, |a| drop_unit_axis(a, 2))?;
            map_opt(&mut new.total_quality_array, |a| drop_unit_axis(a, 1))?;
            new.flag_array = new.flag_array.map(collapse_flag_freqs);
            new.input_flag_array = new.input_flag_array.map(collapse_flag_freqs);
            new.freq_info = FreqInfo::WideBand { freq_range };
            new.nfreqs = 1;
            push_warning(&mut warnings, UvcalWarning::FlagFreqAxisDropped);
        } else {
            map_opt(&mut new.gain_array, |a| drop_unit_axis(a, 1))?;
            map_opt(&mut new.delay_array, |a| drop_unit_axis(a, 1))?;
            map_opt(&mut new.flag_array, |a| drop_unit_axis(a, 1))?;
            map_opt(&mut new.quality_array, |a| drop_unit_axis(a, 1))?;
            map_opt(&mut new.input_flag_array, |a| drop_unit_axis(a, 1))?;
            map_opt(&mut new.total_quality_array, |a| drop_unit_axis(a, 0))?;
        }
        new.shapes = ShapeConvention::Future;

        *self = new;
        Ok(warnings)
    }

    /// Switch back to legacy array shapes. Wide-band objects (including all
    /// future-shaped delay objects) can't be converted.
    pub fn use_current_array_shapes(&mut self) -> Result<(), CheckError> {
        if self.shapes == ShapeConvention::Legacy {
            return Ok(());
        }
        if self.is_wide_band() {
            return Err(CheckError::ShapeConversion(
                "wide-band calibrations can only use future array shapes",
            ));
        }

        fn add_spw_axis<T>(array: &mut Option<ArrayD<T>>, axis: usize) {
            if let Some(a) = array.take() {
                *array = Some(a.insert_axis(Axis(axis)));
            }
        }
        add_spw_axis(&mut self.gain_array, 1);
        add_spw_axis(&mut self.delay_array, 1);
        add_spw_axis(&mut self.flag_array, 1);
        add_spw_axis(&mut self.quality_array, 1);
        add_spw_axis(&mut self.input_flag_array, 1);
        add_spw_axis(&mut self.total_quality_array, 0);
        self.shapes = ShapeConvention::Legacy;
        Ok(())
    }
}
