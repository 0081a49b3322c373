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

//! Tracks the data keys a context needs, from the references found in markings to decrypted key material.

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::{
    cipher::DataKey,
    config::LocalMasterKey,
    document::Document,
    identifiers::{KeyId, KeyRef},
    key::{KeyDocument, MasterKey},
    kms::{self, KmsRequest},
    obfuscate::Obfuscated,
    Error, Result,
};

#[derive(Debug)]
struct KeyEntry {
    document: KeyDocument,
    data_key: Option<DataKey>,
}

/// Resolves key references to decrypted data keys.
///
/// The set of requested references is fixed at construction. Each reference is satisfied by the last fed
/// key document whose `_id` or `keyAltNames` it names; one document can satisfy several references.
#[derive(Debug, Default)]
pub struct KeyBroker {
    requested: IndexMap<KeyRef, Option<KeyId>>,
    keys: IndexMap<KeyId, KeyEntry>,
    satisfied: usize,
}

impl KeyBroker {
    /// A broker for these references. Duplicates are collapsed.
    pub fn new(refs: impl IntoIterator<Item = KeyRef>) -> Self {
        let requested = refs.into_iter().map(|key_ref| (key_ref, None)).collect();
        Self {
            requested,
            ..Default::default()
        }
    }

    /// The distinct requested references, in first-seen order
    pub fn requested(&self) -> impl Iterator<Item = &KeyRef> {
        self.requested.keys()
    }

    /// Register a validated key document.
    ///
    /// Feeding the same `_id` again replaces the earlier document, and the references it resolved are matched
    /// again against the new one. A reference always resolves to the last document naming it; keys no
    /// reference resolves to any more are dropped.
    pub fn add_key_document(&mut self, key: KeyDocument) -> Result<()> {
        if !self.requested.keys().any(|key_ref| key_ref.matches(&key.id, &key.alt_names)) {
            return Err(Error::invalid_key_document(format!(
                "key {} does not match any requested key",
                key.id
            )));
        }

        for resolved in self.requested.values_mut() {
            if *resolved == Some(key.id) {
                *resolved = None;
                self.satisfied -= 1;
            }
        }
        for (key_ref, resolved) in self.requested.iter_mut() {
            if !key_ref.matches(&key.id, &key.alt_names) {
                continue;
            }
            if resolved.replace(key.id).is_none() {
                self.satisfied += 1;
            }
        }

        log::debug!(key_id = Obfuscated::from(&key.id), provider:% = key.master_key.provider(); "Key document registered");
        self.keys.insert(
            key.id,
            KeyEntry {
                document: key,
                data_key: None,
            },
        );
        let requested = &self.requested;
        self.keys
            .retain(|id, _| requested.values().any(|resolved| *resolved == Some(*id)));
        Ok(())
    }

    /// Whether every requested reference has a key document
    pub fn is_satisfied(&self) -> bool {
        self.satisfied == self.requested.len()
    }

    /// References no fed key document matches yet
    pub fn unsatisfied(&self) -> impl Iterator<Item = &KeyRef> {
        self.requested
            .iter()
            .filter_map(|(key_ref, resolved)| resolved.is_none().then_some(key_ref))
    }

    /// Unwrap every `local` key still encrypted
    pub fn decrypt_local(&mut self, master_key: &LocalMasterKey) -> Result<()> {
        for (id, entry) in self.keys.iter_mut() {
            if entry.data_key.is_some() || entry.document.master_key != MasterKey::Local {
                continue;
            }
            entry.data_key = Some(kms::unwrap_local_key(master_key, id, &entry.document.key_material)?);
        }
        Ok(())
    }

    /// One request per fed key that still needs a KMS round trip.
    ///
    /// `endpoint` overrides the endpoint of every AWS request.
    pub fn kms_requests(&self, endpoint: Option<&str>) -> Result<Vec<KmsRequest>> {
        self.keys
            .iter()
            .filter(|(_, entry)| entry.data_key.is_none())
            .filter_map(|(id, entry)| match &entry.document.master_key {
                MasterKey::Aws {
                    region,
                    key,
                    endpoint: key_endpoint,
                } => Some(KmsRequest::aws(
                    *id,
                    region,
                    key,
                    endpoint.or(key_endpoint.as_deref()),
                    &entry.document.key_material,
                )),
                MasterKey::Local => None,
            })
            .collect()
    }

    /// Record the decrypted material of a pending key
    pub fn supply_decrypted(&mut self, id: &KeyId, data_key: DataKey) -> Result<()> {
        let entry = self
            .keys
            .get_mut(id)
            .ok_or_else(|| Error::invalid_input(format!("no key {id} was requested")))?;
        if entry.data_key.is_some() {
            return Err(Error::invalid_input(format!("key {id} is already decrypted")));
        }
        entry.data_key = Some(data_key);
        Ok(())
    }

    /// Whether every fed key has been decrypted
    pub fn is_decryption_complete(&self) -> bool {
        self.keys.values().all(|entry| entry.data_key.is_some())
    }

    /// The decrypted data key satisfying `key_ref`, with its id
    pub fn data_key(&self, key_ref: &KeyRef) -> Option<(KeyId, &DataKey)> {
        let id = self.requested.get(key_ref).copied().flatten()?;
        let data_key = self.keys.get(&id)?.data_key.as_ref()?;
        Some((id, data_key))
    }

    /// Key vault filter selecting every requested key
    pub fn key_filter(&self) -> Document {
        let (ids, alt_names): (Vec<&KeyRef>, Vec<&KeyRef>) =
            self.requested.keys().partition(|key_ref| matches!(key_ref, KeyRef::Id(_)));
        let ids = ids
            .into_iter()
            .filter_map(|key_ref| match key_ref {
                KeyRef::Id(id) => Some(id.to_binary_value()),
                KeyRef::AltName(_) => None,
            })
            .collect::<Vec<_>>();
        let alt_names = alt_names
            .into_iter()
            .filter_map(|key_ref| match key_ref {
                KeyRef::AltName(name) => Some(Value::String(name.clone())),
                KeyRef::Id(_) => None,
            })
            .collect::<Vec<_>>();

        let mut filter = Document::new();
        filter.insert(
            "$or".into(),
            json!([
                { "_id": { "$in": ids } },
                { "keyAltNames": { "$in": alt_names } },
            ]),
        );
        filter
    }
}
