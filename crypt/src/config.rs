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

use std::fmt;

use base64::{prelude::BASE64_STANDARD, Engine as _};
use serde::Deserialize;
use sha2::{Digest as _, Sha256};
use typed_builder::TypedBuilder;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{key::KmsProvider, Error, Result};

/// Master key of the `local` KMS provider, wrapping data keys in-process
#[derive(Clone, Zeroize, ZeroizeOnDrop, derive_more::From)]
pub struct LocalMasterKey([u8; Self::LEN]);

impl LocalMasterKey {
    /// Length of a local master key
    pub const LEN: usize = 32;

    /// A fresh random master key
    pub fn generate() -> Self {
        Self(rand::random::<[u8; Self::LEN]>())
    }
}

impl fmt::Debug for LocalMasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str("LocalMasterKey(hash=")?;
        for x in Sha256::digest(self).as_slice().iter().take(10) {
            fmt::LowerHex::fmt(x, f)?
        }
        f.write_str("...)")
    }
}

impl AsRef<[u8]> for LocalMasterKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for LocalMasterKey {
    type Error = Error;

    fn try_from(buf: &[u8]) -> Result<Self, Self::Error> {
        <[u8; Self::LEN]>::try_from(buf).map(Self).map_err(|_| {
            Error::Configuration(format!(
                "local master key must be {} bytes, got {}",
                Self::LEN,
                buf.len()
            ))
        })
    }
}

impl<'de> Deserialize<'de> for LocalMasterKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error as _;
        let encoded = String::deserialize(deserializer)?;
        let mut bytes = BASE64_STANDARD.decode(encoded).map_err(D::Error::custom)?;
        let key = Self::try_from(bytes.as_slice()).map_err(D::Error::custom);
        bytes.zeroize();
        key
    }
}

/// Settings of the `aws` KMS provider
#[derive(Debug, Clone, Default, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct AwsSettings {
    /// Host overriding `kms.<region>.amazonaws.com` for every request
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Settings of the `local` KMS provider
#[derive(Debug, Clone, Deserialize)]
pub struct LocalSettings {
    /// Master key wrapping every local data key
    pub key: LocalMasterKey,
}

/// The KMS providers a crypt handle may resolve data keys with
#[derive(Debug, Clone, Default, Deserialize, TypedBuilder)]
pub struct KmsProviders {
    /// AWS KMS, reached by the caller
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub aws: Option<AwsSettings>,
    /// In-process unwrapping with a local master key
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub local: Option<LocalSettings>,
}

impl KmsProviders {
    /// Whether key documents of `provider` can be resolved
    pub fn supports(&self, provider: KmsProvider) -> bool {
        match provider {
            KmsProvider::Aws => self.aws.is_some(),
            KmsProvider::Local => self.local.is_some(),
        }
    }
}

/// Configuration parameters for [Crypt][crate::Crypt]
///
/// These can be set directly, via the [builder][CryptConfiguration::builder] or parsed from JSON:
///
/// ```json
/// { "kmsProviders": { "aws": {}, "local": { "key": "<base64 of 32 bytes>" } } }
/// ```
#[derive(Debug, Clone, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct CryptConfiguration {
    /// KMS providers available to resolve data keys
    pub kms_providers: KmsProviders,
}

/// Validated configuration parameters for [Crypt][crate::Crypt].
///
/// These can not be constructed directly, only via [CryptConfiguration].
#[derive(Debug, Clone)]
pub struct ValidatedCryptConfiguration {
    pub(crate) kms_providers: KmsProviders,
}

impl ValidatedCryptConfiguration {
    /// KMS providers available to resolve data keys
    pub fn kms_providers(&self) -> &KmsProviders {
        &self.kms_providers
    }
}

impl CryptConfiguration {
    /// Parse a JSON configuration
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Validate this configuration to produce a validated configuration.
    ///
    /// This can then be passed to [Crypt::try_new][crate::Crypt::try_new].
    pub fn validate(self) -> Result<ValidatedCryptConfiguration> {
        let Self { kms_providers } = self;

        if kms_providers.aws.is_none() && kms_providers.local.is_none() {
            return Err(Error::Configuration("at least one KMS provider is required".into()));
        }
        if let Some(endpoint) = kms_providers.aws.as_ref().and_then(|aws| aws.endpoint.as_deref()) {
            if endpoint.trim().is_empty() {
                return Err(Error::Configuration("aws endpoint must not be empty".into()));
            }
        }

        Ok(ValidatedCryptConfiguration { kms_providers })
    }
}

impl TryFrom<CryptConfiguration> for ValidatedCryptConfiguration {
    type Error = Error;

    fn try_from(value: CryptConfiguration) -> std::result::Result<Self, Self::Error> {
        value.validate()
    }
}
