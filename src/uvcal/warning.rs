// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Non-fatal problems found while checking, converting or reading objects.

use log::warn;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UvcalWarning {
    #[error("The input_flag_array is deprecated and will be removed in a future version")]
    DeprecatedInputFlagArray,

    #[error("key {key} in extra_keywords is longer than 8 characters. It will be written to calfits using the HIERARCH convention")]
    ExtraKeywordKeyTooLong { key: String },

    #[error("{key} in extra_keywords is a list, array or dict, which will cause an error when writing calfits files")]
    ExtraKeywordNotScalar { key: String },

    #[error("The frequencies of spectral window {spw} are spaced by {spacing} Hz, which differs from their channel width ({channel_width} Hz)")]
    ChannelWidthMismatch {
        spw: i32,
        spacing: f64,
        channel_width: f64,
    },

    #[error("The history did not contain the library version; it has been appended")]
    HistoryVersionAppended,

    #[error("{params} are not set or are being overwritten. {params} are set using values from known telescopes for {telescope}")]
    TelescopeParamsFilled { params: String, telescope: String },

    #[error("When converting a delay-style cal to future array shapes the flag_array (and input_flag_array if it exists) must drop the frequency axis")]
    FlagFreqAxisDropped,
}

/// Log a warning and keep it for the caller.
pub(crate) fn push_warning(warnings: &mut Vec<UvcalWarning>, warning: UvcalWarning) {
    warn!("{warning}");
    warnings.push(warning);
}
