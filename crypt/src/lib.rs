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

//! Field Crypt performs client-side, field-level encryption of database commands.
//!
//! The entry point is a [Crypt] handle, built from a validated [CryptConfiguration]. Each command to
//! encrypt gets its own [EncryptionContext], a caller-driven state machine: the context never performs
//! I/O itself, it tells the caller what it needs next (collection metadata, markings, key documents,
//! KMS decryptions) and resumes when the caller feeds the answers back.
#![deny(missing_docs)]

#[cfg(test)]
mod test_utils;

pub use self::error::*;

mod error;
mod obfuscate;

/// Authenticated encryption of single field values
pub mod cipher;
/// Binary ciphertext representation
pub mod ciphertext;
/// Crypt handle configuration
pub mod config;
/// The encryption state machine
pub mod context;
/// The crypt handle shared by every context
pub mod crypt;
/// Extended JSON helpers for the documents flowing through a context
pub mod document;
/// Key identifiers and key references
pub mod identifiers;
/// Data key documents and the key broker
pub mod key;
/// KMS request descriptors and replies
pub mod kms;
/// Placeholder markings emitted by the markings service
pub mod marking;
/// `database.collection` namespaces
pub mod namespace;
/// Per-handle schema cache
pub mod schema_cache;

/// Common imports that should be useful for most uses of the crate
pub mod prelude {
    pub use crate::{
        cipher::DataKey,
        ciphertext::{Algorithm, Ciphertext, ValueType},
        config::{AwsSettings, CryptConfiguration, KmsProviders, LocalMasterKey, LocalSettings},
        context::{ContextState, EncryptionContext},
        crypt::Crypt,
        document::{Binary, Document, FieldPath},
        error::*,
        identifiers::{KeyId, KeyRef},
        key::{broker::KeyBroker, KeyDocument, KmsProvider, MasterKey},
        kms::KmsRequest,
        marking::{Marking, MarkingsReply},
        namespace::Namespace,
        schema_cache::{Schema, SchemaCache},
    };
}

pub use crate::crypt::Crypt;
pub use crate::context::{ContextState, EncryptionContext};
pub use crate::config::CryptConfiguration;
