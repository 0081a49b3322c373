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

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{
    document::{self, Document},
    namespace::Namespace,
    Error, Result,
};

/// A JSON schema describing which fields of a collection are encrypted.
///
/// The raw bytes are kept so a schema supplied by the caller is forwarded to the markings service untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    document: Document,
    bytes: Vec<u8>,
}

impl Schema {
    /// The schema of a collection without encrypted fields
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a schema, keeping `bytes` as given
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let document = document::parse_document(&bytes, "schema")?;
        Ok(Self { document, bytes })
    }

    /// Wrap a schema extracted from a larger document
    pub fn from_document(document: Document) -> Result<Self> {
        let bytes = document::to_vec(&document)?;
        Ok(Self { document, bytes })
    }

    /// Whether there is nothing to encrypt in this collection
    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    /// The schema as a document
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The schema bytes. Empty for [Schema::empty].
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Schemas already resolved by a [Crypt][crate::Crypt] handle, keyed by namespace.
///
/// Both found and absent schemas are cached: an empty [Schema] means the collection was looked up and has none.
/// Entries are never evicted.
#[derive(Debug, Default)]
pub struct SchemaCache(RwLock<HashMap<Namespace, Arc<Schema>>>);

impl SchemaCache {
    /// Look a namespace up
    pub fn get(&self, namespace: &Namespace) -> Result<Option<Arc<Schema>>> {
        let schemas = self.0.read().map_err(|_| Error::LockPoisonError)?;
        Ok(schemas.get(namespace).cloned())
    }

    /// Store the schema of a namespace, replacing any previous entry
    pub fn put(&self, namespace: Namespace, schema: Arc<Schema>) -> Result<()> {
        let mut schemas = self.0.write().map_err(|_| Error::LockPoisonError)?;
        schemas.insert(namespace, schema);
        Ok(())
    }

    /// Number of cached namespaces
    pub fn len(&self) -> Result<usize> {
        Ok(self.0.read().map_err(|_| Error::LockPoisonError)?.len())
    }

    /// Whether nothing has been cached yet
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }
}
