// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Consistency checks.

use itertools::Itertools;
use log::trace;

use super::{
    params::{isclose, Presence, Tier, Tolerance, PARAMETERS},
    push_warning, CalType, CheckError, ShapeConvention, UVCal, UvcalWarning,
};
use crate::constants::{FREQ_ATOL, MAX_FITS_KEY_LEN, SPACING_RTOL};

#[derive(Debug, Clone, Copy)]
pub struct CheckOptions {
    /// Also check optional parameters.
    pub check_extra: bool,

    /// Check that values are acceptable, not just that shapes are right.
    pub run_check_acceptability: bool,

    /// Require the channels of each spectral window to be evenly spaced and
    /// increasing.
    pub check_freq_spacing: bool,

    /// Warn about extra keywords that can't be written to calfits.
    pub check_extra_keyword_types: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            check_extra: true,
            run_check_acceptability: true,
            check_freq_spacing: false,
            check_extra_keyword_types: true,
        }
    }
}

impl UVCal {
    /// Check that the object is internally consistent. Problems that don't
    /// make the object invalid are returned as warnings (and logged).
    pub fn check(&self, opts: &CheckOptions) -> Result<Vec<UvcalWarning>, CheckError> {
        let mut warnings = vec![];

        self.check_modes()?;

        for param in PARAMETERS.iter() {
            let actual = (param.actual_shape)(self);
            match ((param.applies)(self), &actual) {
                (Presence::Forbidden(reason), Some(_)) => {
                    return Err(CheckError::Forbidden {
                        name: param.name,
                        reason,
                    })
                }
                (Presence::Expected, None) => return Err(CheckError::Missing { name: param.name }),
                (_, None) => continue,
                (Presence::Allowed, Some(_)) if !opts.check_extra && param.tier != Tier::Required => {
                    continue
                }
                _ => (),
            }
            trace!("Checking {}", param.name);

            if param.tier == Tier::Deprecated {
                push_warning(&mut warnings, UvcalWarning::DeprecatedInputFlagArray);
            }

            param.check_shape(self)?;

            if opts.run_check_acceptability {
                if let Some(acceptable) = param.acceptable {
                    acceptable(self).map_err(|reason| CheckError::Unacceptable {
                        name: param.name,
                        dtype: param.dtype,
                        reason,
                    })?;
                }
            }
        }

        self.check_antennas()?;
        self.check_flex_spw()?;
        if opts.check_freq_spacing {
            self.check_freq_spacing(&mut warnings)?;
        }
        self.check_extra_keywords(opts, &mut warnings);

        Ok(warnings)
    }

    /// Every present parameter must have the shape its counts imply. Nothing
    /// else is checked, so this is safe on staged objects.
    pub(crate) fn check_shapes(&self) -> Result<(), CheckError> {
        PARAMETERS.iter().try_for_each(|param| param.check_shape(self))
    }

    /// The frequency mode and shape convention must be compatible.
    fn check_modes(&self) -> Result<(), CheckError> {
        match self.shapes {
            ShapeConvention::Legacy => {
                if self.is_wide_band() {
                    return Err(CheckError::WideBandNeedsFutureShapes);
                }
            }
            ShapeConvention::Future => {
                if self.cal_type == CalType::Delay && !self.is_wide_band() {
                    return Err(CheckError::DelayNeedsWideBand);
                }
            }
        }
        if !self.is_wide_band() && !self.is_flex_spw() && self.nspws != 1 {
            return Err(CheckError::MultipleSpwsNeedFlex { nspws: self.nspws });
        }
        if self.is_wide_band() && self.nfreqs != 1 {
            return Err(CheckError::WideBandNfreqs {
                nfreqs: self.nfreqs,
            });
        }
        Ok(())
    }

    fn check_antennas(&self) -> Result<(), CheckError> {
        let missing: Vec<i32> = self
            .ant_array
            .iter()
            .copied()
            .filter(|ant| !self.antenna_numbers.contains(ant))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CheckError::AntsNotInTelescope { ants: missing })
        }
    }

    /// Every channel's window must exist, and each window's channels must be
    /// contiguous.
    fn check_flex_spw(&self) -> Result<(), CheckError> {
        let Some(ids) = self.freq_info.flex_spw_id_array() else {
            return Ok(());
        };
        let missing: Vec<i32> = ids
            .iter()
            .copied()
            .unique()
            .filter(|id| !self.spw_array.contains(id))
            .collect();
        if !missing.is_empty() {
            return Err(CheckError::FlexSpwIdsNotInSpwArray { ids: missing });
        }

        let mut seen = vec![];
        for id in ids.iter().dedup() {
            if seen.contains(id) {
                return Err(CheckError::FlexSpwNotGrouped { spw: *id });
            }
            seen.push(*id);
        }
        Ok(())
    }

    /// The channel indices belonging to each spectral window, in order.
    pub(crate) fn spw_channels(&self) -> Vec<(i32, Vec<usize>)> {
        let Some(freqs) = self.freq_info.freq_array() else {
            return vec![];
        };
        match self.freq_info.flex_spw_id_array() {
            Some(ids) => self
                .spw_array
                .iter()
                .map(|&spw| {
                    let chans = ids.iter().positions(|&id| id == spw).collect();
                    (spw, chans)
                })
                .collect(),
            None => self
                .spw_array
                .iter()
                .map(|&spw| (spw, (0..freqs.len()).collect()))
                .collect(),
        }
    }

    fn check_freq_spacing(&self, warnings: &mut Vec<UvcalWarning>) -> Result<(), CheckError> {
        let (Some(freqs), Some(widths)) =
            (self.freq_info.freq_array(), self.freq_info.channel_width())
        else {
            return Ok(());
        };

        let spacing_tols = Tolerance {
            rtol: SPACING_RTOL,
            atol: FREQ_ATOL,
        };
        for (spw, chans) in self.spw_channels() {
            let diffs: Vec<f64> = chans
                .iter()
                .tuple_windows()
                .map(|(&a, &b)| freqs[b] - freqs[a])
                .collect();
            if diffs.iter().any(|&d| !(d > 0.0)) {
                return Err(CheckError::FreqsNotIncreasing { spw });
            }
            let Some(&first) = diffs.first() else {
                continue;
            };
            if diffs.iter().any(|&d| !isclose(d, first, spacing_tols)) {
                return Err(CheckError::UnevenFreqs { spw });
            }
            let width = widths[chans[0]];
            if !isclose(first, width, spacing_tols) {
                push_warning(
                    warnings,
                    UvcalWarning::ChannelWidthMismatch {
                        spw,
                        spacing: first,
                        channel_width: width,
                    },
                );
            }
        }
        Ok(())
    }

    fn check_extra_keywords(&self, opts: &CheckOptions, warnings: &mut Vec<UvcalWarning>) {
        for (key, value) in &self.extra_keywords {
            if key.len() > MAX_FITS_KEY_LEN {
                push_warning(
                    warnings,
                    UvcalWarning::ExtraKeywordKeyTooLong { key: key.clone() },
                );
            }
            if opts.check_extra_keyword_types && value.is_container() {
                push_warning(
                    warnings,
                    UvcalWarning::ExtraKeywordNotScalar { key: key.clone() },
                );
            }
        }
    }
}
