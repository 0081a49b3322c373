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

use serde_json::{Map, Value};

use crate::{
    ciphertext::Algorithm,
    document::{self, Binary, Document, FieldPath, PathSegment, BINARY_SUBTYPE_ENCRYPTED},
    identifiers::{KeyId, KeyRef},
    Error, Result,
};

/// Leading byte of a placeholder payload, marking an intent to encrypt
pub const INTENT_TO_ENCRYPT: u8 = 0x00;

/// A value of the command that must be encrypted before it leaves the client
#[derive(Debug, Clone, PartialEq)]
pub struct Marking {
    /// Where the placeholder sits in the command
    pub path: FieldPath,
    /// The plaintext to encrypt
    pub value: Value,
    /// How to encrypt it
    pub algorithm: Algorithm,
    /// Which data key to encrypt it with
    pub key: KeyRef,
}

impl Marking {
    /// Parse the placeholder found at `path`.
    ///
    /// `placeholder` is the extended JSON binary of subtype 6 whose payload is the intent marker followed by a
    /// `{"v": .., "a": .., "ki"|"ka": ..}` document.
    pub fn parse_placeholder(path: FieldPath, placeholder: &Value) -> Result<Self> {
        let payload = Binary::from_value_with_subtype(placeholder, BINARY_SUBTYPE_ENCRYPTED)
            .map_err(|e| Error::malformed_marking(format!("invalid marking at `{path}`: {e}")))?;
        let Some((&marker, body)) = payload.split_first() else {
            return Err(Error::malformed_marking("invalid marking, empty placeholder"));
        };
        if marker != INTENT_TO_ENCRYPT {
            return Err(Error::malformed_marking(format!(
                "invalid marking, unexpected leading byte {marker:#04x}"
            )));
        }
        let body: Document = serde_json::from_slice(body)
            .map_err(|e| Error::malformed_marking(format!("invalid marking, not a document: {e}")))?;

        let value = body
            .get("v")
            .cloned()
            .ok_or_else(|| Error::malformed_marking("invalid marking, no 'v'"))?;

        let algorithm = body
            .get("a")
            .ok_or_else(|| Error::malformed_marking("invalid marking, no 'a'"))?
            .as_u64()
            .and_then(|a| u8::try_from(a).ok())
            .and_then(|a| Algorithm::try_from(a).ok())
            .ok_or_else(|| Error::malformed_marking("invalid marking, 'a' must be 1 or 2"))?;

        let key = match (body.get("ki"), body.get("ka")) {
            (Some(_), Some(_)) => {
                return Err(Error::malformed_marking(
                    "invalid marking, 'ki' and 'ka' are mutually exclusive",
                ))
            }
            (None, None) => return Err(Error::malformed_marking("invalid marking, no 'ki' or 'ka'")),
            (Some(ki), None) => KeyRef::Id(
                KeyId::from_binary_value(ki)
                    .map_err(|e| Error::malformed_marking(format!("invalid marking, bad 'ki': {e}")))?,
            ),
            (None, Some(ka)) => KeyRef::AltName(
                ka.as_str()
                    .ok_or_else(|| Error::malformed_marking("invalid marking, 'ka' must be a string"))?
                    .to_owned(),
            ),
        };

        Ok(Self {
            path,
            value,
            algorithm,
            key,
        })
    }

    /// Render this marking back into a placeholder binary
    pub fn to_placeholder(&self) -> Result<Value> {
        let mut body = Map::new();
        body.insert("v".into(), self.value.clone());
        body.insert("a".into(), Value::from(self.algorithm as u8));
        match &self.key {
            KeyRef::Id(id) => body.insert("ki".into(), id.to_binary_value()),
            KeyRef::AltName(name) => body.insert("ka".into(), Value::String(name.clone())),
        };
        let mut payload = vec![INTENT_TO_ENCRYPT];
        serde_json::to_writer(&mut payload, &body)?;
        Ok(Binary::new(BINARY_SUBTYPE_ENCRYPTED, payload).to_value())
    }
}

/// What the markings service told us about a command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkingsReply {
    /// Whether anything in the command has to be encrypted at all
    pub requires_encryption: bool,
    /// The command with placeholders where encrypted values go
    pub command: Document,
    /// Every placeholder found in `command`, in document order
    pub markings: Vec<Marking>,
}

impl MarkingsReply {
    /// The key references of every marking, in document order, duplicates included
    pub fn key_refs(&self) -> impl Iterator<Item = &KeyRef> {
        self.markings.iter().map(|marking| &marking.key)
    }
}

fn flag(reply: &Document, name: &str) -> Result<bool> {
    match reply.get(name) {
        None => Err(Error::malformed_marking(format!("no '{name}'"))),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(Error::malformed_marking(format!("'{name}' must be a boolean"))),
    }
}

fn is_ok(reply: &Document) -> Result<bool> {
    match reply.get("ok") {
        None => Err(Error::malformed_marking("no 'ok'")),
        Some(Value::Bool(ok)) => Ok(*ok),
        Some(Value::Number(ok)) => Ok(ok.as_f64().is_some_and(|ok| ok != 0.0)),
        Some(_) => Err(Error::malformed_marking("'ok' must be a number or a boolean")),
    }
}

/// Validate a markings service reply and extract its placeholders.
///
/// Both flags and `ok` are required, and the flags must agree with the placeholders actually present:
/// a reply carrying placeholders it does not announce is malformed.
pub fn interpret_markings(reply: &Document) -> Result<MarkingsReply> {
    if !is_ok(reply)? {
        let errmsg = reply
            .get("errmsg")
            .and_then(Value::as_str)
            .unwrap_or("markings service reported a failure");
        return Err(Error::invalid_input(errmsg));
    }

    let schema_requires_encryption = flag(reply, "schemaRequiresEncryption")?;
    let has_encrypted_placeholders = flag(reply, "hasEncryptedPlaceholders")?;

    let command = match reply.get("result") {
        Some(Value::Object(command)) => command.clone(),
        Some(_) => return Err(Error::malformed_marking("'result' must be a document")),
        None if has_encrypted_placeholders => {
            return Err(Error::malformed_marking("markings reply has placeholders but no 'result'"))
        }
        None => Document::new(),
    };

    let mut markings = vec![];
    for (name, value) in &command {
        let path = FieldPath::root().child(PathSegment::Field(name.clone()));
        document::visit_binaries(value, &path, &mut |path, value| {
            let is_placeholder = Binary::from_value(value).is_ok_and(|b| b.subtype == BINARY_SUBTYPE_ENCRYPTED);
            if is_placeholder {
                markings.push(Marking::parse_placeholder(path.clone(), value)?);
            }
            Ok(())
        })?;
    }

    if !markings.is_empty() && !has_encrypted_placeholders {
        return Err(Error::malformed_marking(
            "'hasEncryptedPlaceholders' is false but the command has placeholders",
        ));
    }
    if !markings.is_empty() && !schema_requires_encryption {
        return Err(Error::malformed_marking(
            "'schemaRequiresEncryption' is false but the command has placeholders",
        ));
    }

    Ok(MarkingsReply {
        requires_encryption: !markings.is_empty(),
        command,
        markings,
    })
}
