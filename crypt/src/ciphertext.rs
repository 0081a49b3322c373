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

//! Binary ciphertext layout:
//!
//! ```text
//! [ algorithm: u8 | key id: [u8; 16] | original value type: u8 | payload: [u8] ]
//! ```
//!
//! The whole buffer is embedded in the output document as a binary of subtype 6, at the path of the
//! placeholder it replaces.

use serde_json::Value;

use crate::{
    document::{Binary, BINARY_SUBTYPE_ENCRYPTED},
    identifiers::KeyId,
    CodecError,
};

/// Length of the fixed header preceding the payload
pub const HEADER_LEN: usize = 1 + KeyId::LEN + 1;

/// Encryption algorithm of a marking and of the ciphertext produced for it
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Algorithm {
    /// Equal plaintexts under the same key produce equal ciphertexts, so the field stays queryable
    Deterministic = 1,
    /// A fresh random nonce per encryption
    Random = 2,
}

impl TryFrom<u8> for Algorithm {
    type Error = CodecError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(Self::Deterministic),
            2 => Ok(Self::Random),
            tag => Err(CodecError::UnexpectedSubtype(tag)),
        }
    }
}

/// Type of the plaintext value, using the BSON type codes so ciphertexts stay self-describing
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ValueType {
    /// 64-bit float
    Double = 0x01,
    /// UTF-8 string
    String = 0x02,
    /// Embedded document
    Document = 0x03,
    /// Array
    Array = 0x04,
    /// Boolean
    Boolean = 0x08,
    /// Null
    Null = 0x0A,
    /// 32-bit integer
    Int32 = 0x10,
    /// 64-bit integer
    Int64 = 0x12,
}

impl ValueType {
    /// The type a JSON value is stored as
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(number) => match number.as_i64() {
                Some(n) if i32::try_from(n).is_ok() => Self::Int32,
                Some(_) => Self::Int64,
                None => Self::Double,
            },
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Document,
        }
    }
}

impl TryFrom<u8> for ValueType {
    type Error = CodecError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0x01 => Self::Double,
            0x02 => Self::String,
            0x03 => Self::Document,
            0x04 => Self::Array,
            0x08 => Self::Boolean,
            0x0A => Self::Null,
            0x10 => Self::Int32,
            0x12 => Self::Int64,
            code => return Err(CodecError::UnknownValueType(code)),
        })
    }
}

/// A decoded ciphertext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    /// Algorithm the payload was produced with
    pub algorithm: Algorithm,
    /// Data key the payload is encrypted with
    pub key_id: KeyId,
    /// Type of the plaintext value
    pub value_type: ValueType,
    /// Encrypted payload
    pub data: Vec<u8>,
}

impl Ciphertext {
    /// Serialize into the binary layout
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.data.len());
        buf.push(self.algorithm as u8);
        buf.extend_from_slice(self.key_id.as_bytes());
        buf.push(self.value_type as u8);
        buf.extend_from_slice(&self.data);
        buf
    }

    /// Parse the binary layout.
    ///
    /// Fails on buffers shorter than [HEADER_LEN] and on unknown algorithm or value type tags. A placeholder
    /// (leading byte `0`) is not a ciphertext and is rejected.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < HEADER_LEN {
            return Err(CodecError::TooShort {
                expected: HEADER_LEN,
                actual: buf.len(),
            });
        }
        let (header, data) = buf.split_at(HEADER_LEN);
        let algorithm = Algorithm::try_from(header[0])?;
        let key_id = KeyId::try_from(&header[1..1 + KeyId::LEN])?;
        let value_type = ValueType::try_from(header[HEADER_LEN - 1])?;
        Ok(Self {
            algorithm,
            key_id,
            value_type,
            data: data.to_vec(),
        })
    }

    /// Extended JSON binary of subtype 6 wrapping the encoded ciphertext
    pub fn to_binary_value(&self) -> Value {
        Binary::new(BINARY_SUBTYPE_ENCRYPTED, self.encode()).to_value()
    }

    /// Decode a ciphertext from its extended JSON binary
    pub fn from_binary_value(value: &Value) -> Result<Self, CodecError> {
        let bytes = Binary::from_value_with_subtype(value, BINARY_SUBTYPE_ENCRYPTED)?;
        Self::decode(&bytes)
    }
}
