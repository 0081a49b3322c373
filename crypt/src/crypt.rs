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

use std::sync::Arc;

use crate::{
    config::{CryptConfiguration, ValidatedCryptConfiguration},
    context::EncryptionContext,
    schema_cache::SchemaCache,
    Result,
};

#[derive(Debug)]
pub(crate) struct CryptInner {
    pub(crate) configuration: ValidatedCryptConfiguration,
    pub(crate) schema_cache: SchemaCache,
}

/// Shared state of every [EncryptionContext] it creates: the validated configuration and the schema cache.
///
/// It is cheap to clone a `Crypt` because everything is wrapped inside an [Arc]. Contexts hold a clone, so a
/// handle outlives every context created from it.
#[derive(Debug, Clone)]
pub struct Crypt {
    pub(crate) inner: Arc<CryptInner>,
}

impl Crypt {
    /// Validate `configuration` and create a handle with an empty schema cache
    pub fn try_new(configuration: CryptConfiguration) -> Result<Self> {
        let configuration = configuration.validate()?;
        log::info!(
            aws = configuration.kms_providers().aws.is_some(),
            local = configuration.kms_providers().local.is_some();
            "Crypt handle created"
        );
        Ok(Self {
            inner: Arc::new(CryptInner {
                configuration,
                schema_cache: SchemaCache::default(),
            }),
        })
    }

    /// A fresh context, in state [Init][crate::ContextState::Init]
    pub fn new_encryption_context(&self) -> EncryptionContext {
        EncryptionContext::new(self.clone())
    }

    /// The schemas resolved so far by contexts of this handle
    pub fn schema_cache(&self) -> &SchemaCache {
        &self.inner.schema_cache
    }

    /// The validated configuration
    pub fn configuration(&self) -> &ValidatedCryptConfiguration {
        &self.inner.configuration
    }
}
