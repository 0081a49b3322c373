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

mod codec;
mod status;

pub use codec::CodecError;
pub use status::{ErrorKind, Status};

use crate::context::ContextState;

/// A module-specific [Result][core::result::Result] type with a default error variant.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors produced by the crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The namespace is empty or is not of the form `database.collection`
    #[error("invalid namespace {0:?}: expected `database.collection`")]
    InvalidNamespace(String),
    /// The operation is not allowed in the current state of the context
    #[error("cannot {operation} while the context is in state {state}")]
    WrongState {
        /// What the caller attempted
        operation: &'static str,
        /// Where the context was when it happened
        state: ContextState,
    },
    /// The caller fed a missing, empty or unparseable input
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The collection metadata describes a view
    #[error("cannot auto encrypt a view")]
    ViewNotSupported,
    /// The markings service returned a placeholder we cannot interpret
    #[error("malformed marking: {0}")]
    MalformedMarking(String),
    /// A key document is missing required fields or was not requested
    #[error("invalid key document: {0}")]
    InvalidKeyDocument(String),
    /// Key documents were not provided for every requested key
    #[error("did not provide all keys: {missing} key reference(s) left unresolved")]
    IncompleteKeys {
        /// How many requested references have no matching key document
        missing: usize,
    },
    /// A binary ciphertext could not be decoded
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// A KMS reply or decrypted key material was unusable
    #[error("kms: {0}")]
    Kms(String),
    /// The underlying cipher failed
    #[error("cipher operation failed: {0}")]
    Crypto(&'static str),
    /// The crypt handle configuration is invalid
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// A JSON document could not be parsed or produced
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// One of the schema cache locks has been poisoned
    #[error("One of the schema cache locks has been poisoned")]
    LockPoisonError,
    /// The context already failed; carries the status attached at that time
    #[error("{0}")]
    ContextFailed(Status),
}

impl Error {
    /// The category of this error, as recorded in a context [Status]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidNamespace(_) => ErrorKind::InvalidNamespace,
            Error::WrongState { .. } | Error::ContextFailed(_) => ErrorKind::WrongState,
            Error::InvalidInput(_) | Error::Json(_) => ErrorKind::InvalidInput,
            Error::ViewNotSupported => ErrorKind::ViewNotSupported,
            Error::MalformedMarking(_) => ErrorKind::MalformedMarking,
            Error::InvalidKeyDocument(_) => ErrorKind::InvalidKeyDocument,
            Error::IncompleteKeys { .. } => ErrorKind::IncompleteKeys,
            Error::Codec(_) => ErrorKind::Codec,
            Error::Kms(_) => ErrorKind::Kms,
            Error::Crypto(_) => ErrorKind::Crypto,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::LockPoisonError => ErrorKind::Internal,
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub(crate) fn malformed_marking(message: impl Into<String>) -> Self {
        Self::MalformedMarking(message.into())
    }

    pub(crate) fn invalid_key_document(message: impl Into<String>) -> Self {
        Self::InvalidKeyDocument(message.into())
    }
}

/// Produce the error message from the innermost wrapped error.
///
/// Codec and JSON failures are wrapped transparently, which is good at keeping context and bad at surfacing
/// the root cause in a plain `.to_string()` call.
pub trait InnermostErrorMessage {
    /// Produce the error message from the innermost wrapped error.
    fn innermost_error_message(&self) -> String;
}

impl<E: std::error::Error> InnermostErrorMessage for E {
    fn innermost_error_message(&self) -> String {
        let mut err: &dyn std::error::Error = self;
        while let Some(source) = err.source() {
            err = source;
        }
        err.to_string()
    }
}
