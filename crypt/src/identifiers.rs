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

use serde_json::Value;

use crate::{
    document::{Binary, BINARY_SUBTYPE_UUID},
    CodecError,
};

/// Identifier of a data key: a 16-byte UUID, stored as a binary of subtype 4.
#[repr(transparent)]
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeyId(uuid::Uuid);

impl KeyId {
    /// Fixed length of a key id
    pub const LEN: usize = 16;

    /// Wrap raw key id bytes
    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(uuid::Uuid::from_bytes(bytes))
    }

    /// The raw bytes of this key id
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        self.0.as_bytes()
    }

    /// Extended JSON form: `{"$binary": {"base64": .., "subType": "04"}}`
    pub fn to_binary_value(&self) -> Value {
        Binary::new(BINARY_SUBTYPE_UUID, self.as_bytes().to_vec()).to_value()
    }

    /// Parse a key id from its extended JSON form
    pub fn from_binary_value(value: &Value) -> Result<Self, CodecError> {
        let bytes = Binary::from_value_with_subtype(value, BINARY_SUBTYPE_UUID)?;
        Self::try_from(bytes.as_slice())
    }
}

impl TryFrom<&[u8]> for KeyId {
    type Error = CodecError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; Self::LEN] = bytes.try_into().map_err(|_| CodecError::InvalidKeyIdLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self::from_bytes(bytes))
    }
}

impl From<uuid::Uuid> for KeyId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl std::ops::Deref for KeyId {
    type Target = uuid::Uuid;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How a marking names the data key it must be encrypted with
#[derive(Debug, Hash, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyRef {
    /// By key id (`ki`)
    Id(KeyId),
    /// By one of the key's alternate names (`ka`)
    AltName(String),
}

impl KeyRef {
    /// Does a key with this id and these alternate names satisfy this reference?
    pub fn matches(&self, id: &KeyId, alt_names: &[String]) -> bool {
        match self {
            KeyRef::Id(wanted) => wanted == id,
            KeyRef::AltName(wanted) => alt_names.iter().any(|name| name == wanted),
        }
    }
}

impl From<KeyId> for KeyRef {
    fn from(id: KeyId) -> Self {
        Self::Id(id)
    }
}

impl fmt::Display for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRef::Id(id) => write!(f, "id {id}"),
            KeyRef::AltName(name) => write!(f, "alt name {name:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_id_binary_value_round_trips() {
        let id = KeyId::from(uuid::Uuid::new_v4());
        let value = id.to_binary_value();
        assert_eq!(value["$binary"]["subType"], "04");
        assert_eq!(KeyId::from_binary_value(&value).unwrap(), id);
    }

    #[test]
    fn key_id_rejects_wrong_length() {
        let err = KeyId::try_from([0u8; 12].as_slice()).unwrap_err();
        assert_eq!(
            err,
            CodecError::InvalidKeyIdLength {
                expected: KeyId::LEN,
                actual: 12
            }
        );
    }

    #[test]
    fn key_id_rejects_wrong_subtype() {
        let value = Binary::new(0, vec![0; KeyId::LEN]).to_value();
        assert!(matches!(
            KeyId::from_binary_value(&value),
            Err(CodecError::UnexpectedBinarySubtype { expected: 4, actual: 0 })
        ));
    }

    #[test]
    fn key_ref_matches_id_or_alt_name() {
        let id = KeyId::from_bytes([7; KeyId::LEN]);
        let other = KeyId::from_bytes([8; KeyId::LEN]);
        let names = vec!["payroll".to_string()];
        assert!(KeyRef::Id(id).matches(&id, &[]));
        assert!(!KeyRef::Id(id).matches(&other, &names));
        assert!(KeyRef::AltName("payroll".into()).matches(&other, &names));
        assert!(!KeyRef::AltName("hr".into()).matches(&other, &names));
    }
}
