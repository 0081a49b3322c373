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
use serde_json::{json, Value};

use crate::{CodecError, Error, Result};

/// A JSON document: the top level of every buffer exchanged with a context.
pub type Document = serde_json::Map<String, Value>;

/// Generic binary data (`keyMaterial`)
pub const BINARY_SUBTYPE_GENERIC: u8 = 0x00;
/// UUID binary (key ids)
pub const BINARY_SUBTYPE_UUID: u8 = 0x04;
/// Encrypted binary, used both for placeholders and for ciphertexts
pub const BINARY_SUBTYPE_ENCRYPTED: u8 = 0x06;

/// An extended JSON binary value: `{"$binary": {"base64": "...", "subType": "06"}}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    /// Binary subtype
    pub subtype: u8,
    /// Decoded payload
    pub bytes: Vec<u8>,
}

impl Binary {
    /// Build a binary value
    pub fn new(subtype: u8, bytes: Vec<u8>) -> Self {
        Self { subtype, bytes }
    }

    /// Whether `value` has the shape of an extended JSON binary, whatever its contents
    pub fn is_binary(value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|object| object.len() == 1 && object.contains_key("$binary"))
    }

    /// Parse an extended JSON binary
    pub fn from_value(value: &Value) -> Result<Self, CodecError> {
        let binary = value
            .as_object()
            .and_then(|object| object.get("$binary"))
            .and_then(Value::as_object)
            .ok_or(CodecError::NotBinary("missing `$binary` document"))?;
        let encoded = binary
            .get("base64")
            .and_then(Value::as_str)
            .ok_or(CodecError::NotBinary("missing `base64` string"))?;
        let subtype = binary
            .get("subType")
            .and_then(Value::as_str)
            .ok_or(CodecError::NotBinary("missing `subType` string"))?;
        let subtype = u8::from_str_radix(subtype, 16).map_err(|_| CodecError::NotBinary("`subType` is not hex"))?;
        let bytes = BASE64_STANDARD.decode(encoded)?;
        Ok(Self { subtype, bytes })
    }

    /// Parse an extended JSON binary, requiring a specific subtype, and return its payload
    pub fn from_value_with_subtype(value: &Value, expected: u8) -> Result<Vec<u8>, CodecError> {
        let binary = Self::from_value(value)?;
        if binary.subtype != expected {
            return Err(CodecError::UnexpectedBinarySubtype {
                expected,
                actual: binary.subtype,
            });
        }
        Ok(binary.bytes)
    }

    /// Render as extended JSON
    pub fn to_value(&self) -> Value {
        json!({
            "$binary": {
                "base64": BASE64_STANDARD.encode(&self.bytes),
                "subType": format!("{:02x}", self.subtype),
            }
        })
    }
}

/// One step of a [FieldPath]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A document field
    Field(String),
    /// An array element
    Index(usize),
}

/// Location of a value inside a document, e.g. `filter.ssn` or `updates.0.q.ssn`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// The path of the document itself
    pub fn root() -> Self {
        Self::default()
    }

    pub(crate) fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// The steps of this path, outermost first
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Borrow the value at this path
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(root, |value, segment| match segment {
            PathSegment::Field(name) => value.as_object()?.get(name),
            PathSegment::Index(index) => value.as_array()?.get(*index),
        })
    }

    fn get_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Value> {
        self.0.iter().try_fold(root, |value, segment| match segment {
            PathSegment::Field(name) => value.as_object_mut()?.get_mut(name),
            PathSegment::Index(index) => value.as_array_mut()?.get_mut(*index),
        })
    }

    /// Replace the value at this path, returning the previous one
    pub fn replace(&self, root: &mut Value, replacement: Value) -> Result<Value> {
        let slot = self
            .get_mut(root)
            .ok_or_else(|| Error::invalid_input(format!("no value at path `{self}`")))?;
        Ok(std::mem::replace(slot, replacement))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                PathSegment::Field(name) => f.write_str(name)?,
                PathSegment::Index(index) => write!(f, "{index}")?,
            }
        }
        Ok(())
    }
}

/// Look a dotted path (`filter.ssn`, `documents.0.ssn`) up in a document
pub fn lookup<'a>(root: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted.split('.').try_fold(root, |value, segment| match value {
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
        Value::Object(fields) => fields.get(segment),
        _ => None,
    })
}

/// Call `f` on every extended JSON binary found under `value`, depth first, with its path
pub(crate) fn visit_binaries<F>(value: &Value, path: &FieldPath, f: &mut F) -> Result<()>
where
    F: FnMut(&FieldPath, &Value) -> Result<()>,
{
    if Binary::is_binary(value) {
        return f(path, value);
    }
    match value {
        Value::Object(fields) => {
            for (name, child) in fields {
                visit_binaries(child, &path.child(PathSegment::Field(name.clone())), f)?;
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                visit_binaries(child, &path.child(PathSegment::Index(index)), f)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Parse a caller supplied buffer into a document.
///
/// An empty buffer is how a caller hands us "nothing"; it is rejected like any other invalid input.
pub(crate) fn parse_document(bytes: &[u8], what: &str) -> Result<Document> {
    if bytes.is_empty() {
        return Err(Error::invalid_input(format!("invalid NULL {what}")));
    }
    let value = serde_json::from_slice::<Value>(bytes)
        .map_err(|e| Error::invalid_input(format!("{what} is not valid JSON: {e}")))?;
    match value {
        Value::Object(document) => Ok(document),
        _ => Err(Error::invalid_input(format!("{what} must be a document"))),
    }
}

pub(crate) fn to_vec(document: &Document) -> Result<Vec<u8>> {
    serde_json::to_vec(document).map_err(Into::into)
}
