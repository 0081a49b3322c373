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
    fmt::{Debug, Formatter},
    sync::LazyLock,
};

use derive_more::From;
use log::kv::{ToValue, Value};
use sha2::{Digest, Sha256};

use crate::{identifiers::KeyId, identifiers::KeyRef, namespace::Namespace};

/// Values we want in logs without revealing them: key ids and namespaces can both identify user data.
pub(crate) trait Obfuscate {
    fn obfuscate(&self, f: &mut Formatter<'_>) -> core::fmt::Result;
}

pub(crate) fn compute_hash(bytes: &[u8]) -> [u8; 10] {
    /// Regenerated on every process start, so obfuscated values cannot become stable pseudo-ids.
    static SALT: LazyLock<[u8; 32]> = LazyLock::new(|| {
        use rand::Rng as _;
        let mut salt = [0; 32];
        rand::thread_rng().fill(&mut salt);
        salt
    });

    let mut hasher = Sha256::new();
    hasher.update(*SALT);
    hasher.update(bytes);

    let mut output = [0; 10];
    output.copy_from_slice(&hasher.finalize().as_slice()[0..10]);
    output
}

impl Obfuscate for KeyId {
    fn obfuscate(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(hex::encode(compute_hash(self.as_bytes())).as_str())
    }
}

impl Obfuscate for KeyRef {
    fn obfuscate(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            KeyRef::Id(id) => id.obfuscate(f),
            KeyRef::AltName(name) => {
                f.write_str("alt:")?;
                f.write_str(hex::encode(compute_hash(name.as_bytes())).as_str())
            }
        }
    }
}

impl Obfuscate for Namespace {
    fn obfuscate(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(hex::encode(compute_hash(self.as_str().as_bytes())).as_str())
    }
}

#[derive(From)]
pub(crate) struct Obfuscated<'a, T: Obfuscate + ?Sized>(&'a T);

impl<T: Obfuscate + ?Sized> Debug for Obfuscated<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        self.0.obfuscate(f)
    }
}

impl<T: Obfuscate + ?Sized> ToValue for Obfuscated<'_, T> {
    fn to_value(&self) -> Value<'_> {
        Value::from_debug(self)
    }
}
