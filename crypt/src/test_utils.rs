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

use serde_json::Value;

use crate::{
    ciphertext::Algorithm,
    config::{AwsSettings, CryptConfiguration, KmsProviders, LocalMasterKey, LocalSettings},
    document::FieldPath,
    identifiers::KeyRef,
    marking::Marking,
    Crypt,
};

pub(crate) fn init_logger() {
    let _ = pretty_env_logger::try_init();
}

/// A handle with both the `aws` and `local` providers configured
pub(crate) fn crypt_with(local: LocalMasterKey) -> Crypt {
    init_logger();
    let config = CryptConfiguration::builder()
        .kms_providers(
            KmsProviders::builder()
                .aws(AwsSettings::default())
                .local(LocalSettings { key: local })
                .build(),
        )
        .build();
    Crypt::try_new(config).unwrap()
}

pub(crate) fn crypt() -> Crypt {
    crypt_with(LocalMasterKey::generate())
}

/// The placeholder the markings service would emit for `value`
pub(crate) fn placeholder(value: Value, algorithm: Algorithm, key: KeyRef) -> Value {
    Marking {
        path: FieldPath::root(),
        value,
        algorithm,
        key,
    }
    .to_placeholder()
    .unwrap()
}
