// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all of this crate's public operations.

use thiserror::Error;

use crate::{
    initializers::InitError,
    io::calfits::{CalfitsReadError, CalfitsWriteError},
    telescopes::TelescopeError,
    uvcal::{CheckError, SelectError},
};

/// The error type for all public operations. Each module's own error is
/// wrapped without alteration.
#[derive(Error, Debug)]
pub enum UvcalError {
    #[error(transparent)]
    Check(#[from] CheckError),

    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    CalfitsRead(#[from] CalfitsReadError),

    #[error(transparent)]
    CalfitsWrite(#[from] CalfitsWriteError),

    #[error(transparent)]
    Telescope(#[from] TelescopeError),
}
