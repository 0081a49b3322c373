// Wire
// Copyright (C) 2022 Wire Swiss GmbH

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program. If not, see http://www.gnu.org/licenses/.

use super::Error;

/// Category of a failure, as attached to a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum ErrorKind {
    /// See [Error::InvalidNamespace]
    InvalidNamespace,
    /// See [Error::WrongState]
    WrongState,
    /// See [Error::InvalidInput]
    InvalidInput,
    /// See [Error::ViewNotSupported]
    ViewNotSupported,
    /// See [Error::MalformedMarking]
    MalformedMarking,
    /// See [Error::InvalidKeyDocument]
    InvalidKeyDocument,
    /// See [Error::IncompleteKeys]
    IncompleteKeys,
    /// See [Error::Codec]
    Codec,
    /// See [Error::Kms]
    Kms,
    /// See [Error::Crypto]
    Crypto,
    /// See [Error::Configuration]
    Configuration,
    /// Failures of the crate itself, such as a poisoned lock
    Internal,
}

/// The failure attached to a context when it enters the error state.
///
/// Once attached it is never replaced: every later operation on the context reports it again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Status {
    kind: ErrorKind,
    message: String,
}

impl Status {
    /// The category of the failure
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human readable message of the failure
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&Error> for Status {
    fn from(err: &Error) -> Self {
        match err {
            Error::ContextFailed(status) => status.clone(),
            err => Self {
                kind: err.kind(),
                message: err.to_string(),
            },
        }
    }
}
