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

pub mod broker;

use serde_json::{json, Value};

use crate::{
    document::{Binary, Document, BINARY_SUBTYPE_GENERIC},
    identifiers::KeyId,
    Error, Result,
};

/// Where a data key's master key lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum KmsProvider {
    /// AWS KMS
    Aws,
    /// A master key held in the crypt configuration
    Local,
}

/// The `masterKey` of a key document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MasterKey {
    /// Wrapped by an AWS KMS customer master key
    Aws {
        /// Region of the customer master key
        region: String,
        /// ARN of the customer master key
        key: String,
        /// Host to reach instead of the regional endpoint
        endpoint: Option<String>,
    },
    /// Wrapped by the configured local master key
    Local,
}

impl MasterKey {
    /// The provider able to unwrap keys under this master key
    pub fn provider(&self) -> KmsProvider {
        match self {
            MasterKey::Aws { .. } => KmsProvider::Aws,
            MasterKey::Local => KmsProvider::Local,
        }
    }

    fn parse(master_key: &Value) -> Result<Self> {
        let master_key = master_key
            .as_object()
            .ok_or_else(|| Error::invalid_key_document("'masterKey' must be a document"))?;
        let provider = master_key
            .get("provider")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_key_document("no 'provider' in 'masterKey'"))?;
        let provider = provider
            .parse::<KmsProvider>()
            .map_err(|_| Error::invalid_key_document(format!("unknown KMS provider {provider:?}")))?;

        let string_field = |name: &str| -> Result<Option<String>> {
            match master_key.get(name) {
                None => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(Error::invalid_key_document(format!("'{name}' must be a string"))),
            }
        };

        Ok(match provider {
            KmsProvider::Aws => MasterKey::Aws {
                region: string_field("region")?.ok_or_else(|| Error::invalid_key_document("no key region"))?,
                key: string_field("key")?.ok_or_else(|| Error::invalid_key_document("no key ARN"))?,
                endpoint: string_field("endpoint")?,
            },
            KmsProvider::Local => MasterKey::Local,
        })
    }

    fn to_value(&self) -> Value {
        match self {
            MasterKey::Aws { region, key, endpoint } => {
                let mut value = json!({ "provider": KmsProvider::Aws.to_string(), "region": region, "key": key });
                if let Some(endpoint) = endpoint {
                    value["endpoint"] = Value::String(endpoint.clone());
                }
                value
            }
            MasterKey::Local => json!({ "provider": KmsProvider::Local.to_string() }),
        }
    }
}

/// A data key as stored in the key vault collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDocument {
    /// `_id`
    pub id: KeyId,
    /// `keyAltNames`
    pub alt_names: Vec<String>,
    /// `keyMaterial`: the data key, wrapped by its master key
    pub key_material: Vec<u8>,
    /// `masterKey`
    pub master_key: MasterKey,
}

impl KeyDocument {
    /// Validate a key vault document
    pub fn parse(document: &Document) -> Result<Self> {
        let id = document
            .get("_id")
            .ok_or_else(|| Error::invalid_key_document("no '_id'"))?;
        let id = KeyId::from_binary_value(id).map_err(|e| Error::invalid_key_document(format!("invalid '_id': {e}")))?;

        let alt_names = match document.get("keyAltNames") {
            None => vec![],
            Some(Value::Array(names)) => names
                .iter()
                .map(|name| {
                    name.as_str()
                        .map(str::to_owned)
                        .ok_or_else(|| Error::invalid_key_document("'keyAltNames' must only hold strings"))
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(Error::invalid_key_document("'keyAltNames' must be an array")),
        };

        let key_material = document
            .get("keyMaterial")
            .ok_or_else(|| Error::invalid_key_document("no 'keyMaterial'"))?;
        let key_material = Binary::from_value(key_material)
            .map_err(|e| Error::invalid_key_document(format!("invalid 'keyMaterial': {e}")))?
            .bytes;
        if key_material.is_empty() {
            return Err(Error::invalid_key_document("empty 'keyMaterial'"));
        }

        let master_key = document
            .get("masterKey")
            .ok_or_else(|| Error::invalid_key_document("no 'masterKey'"))?;
        let master_key = MasterKey::parse(master_key)?;

        Ok(Self {
            id,
            alt_names,
            key_material,
            master_key,
        })
    }

    /// Render as a key vault document
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        document.insert("_id".into(), self.id.to_binary_value());
        if !self.alt_names.is_empty() {
            document.insert("keyAltNames".into(), json!(self.alt_names));
        }
        document.insert(
            "keyMaterial".into(),
            Binary::new(BINARY_SUBTYPE_GENERIC, self.key_material.clone()).to_value(),
        );
        document.insert("masterKey".into(), self.master_key.to_value());
        document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn aws_key() -> KeyDocument {
        KeyDocument {
            id: KeyId::from_bytes([9; 16]),
            alt_names: vec!["payroll".into()],
            key_material: vec![1; 32],
            master_key: MasterKey::Aws {
                region: "us-east-1".into(),
                key: "arn:aws:kms:us-east-1:579766882180:key/89fcc2c4-08b0-4bd9-9f25-e30687b580d0".into(),
                endpoint: None,
            },
        }
    }

    #[test]
    fn parses_what_it_renders() {
        let key = aws_key();
        assert_eq!(KeyDocument::parse(&key.to_document()).unwrap(), key);

        let local = KeyDocument {
            alt_names: vec![],
            master_key: MasterKey::Local,
            ..aws_key()
        };
        assert_eq!(KeyDocument::parse(&local.to_document()).unwrap(), local);
        assert_eq!(local.master_key.provider(), KmsProvider::Local);
    }

    #[rstest]
    #[case("_id", "no '_id'")]
    #[case("keyMaterial", "no 'keyMaterial'")]
    #[case("masterKey", "no 'masterKey'")]
    fn missing_fields_are_rejected(#[case] field: &str, #[case] expected: &str) {
        let mut document = aws_key().to_document();
        document.remove(field);
        assert!(matches!(
            KeyDocument::parse(&document),
            Err(Error::InvalidKeyDocument(m)) if m.contains(expected)
        ));
    }

    #[test]
    fn aws_key_needs_a_region() {
        let mut document = aws_key().to_document();
        document["masterKey"].as_object_mut().unwrap().remove("region");
        assert!(matches!(
            KeyDocument::parse(&document),
            Err(Error::InvalidKeyDocument(m)) if m == "no key region"
        ));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let mut document = aws_key().to_document();
        document["masterKey"]["provider"] = json!("gcp");
        assert!(matches!(
            KeyDocument::parse(&document),
            Err(Error::InvalidKeyDocument(m)) if m.contains("gcp")
        ));
    }
}
