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

use serde_json::{json, Value};

use super::{ContextState, EncryptionContext, Phase, Resolution};
use crate::{
    cipher::{self, DataKey},
    document::{self, Document},
    identifiers::KeyId,
    key::{broker::KeyBroker, KeyDocument},
    kms::{self, KmsRequest},
    marking,
    namespace::Namespace,
    obfuscate::Obfuscated,
    schema_cache::Schema,
    Error, Result,
};

/// The `$jsonSchema` of a collection, from its listCollections entry
fn schema_from_collection_info(collection_info: &Document) -> Result<Schema> {
    match document::lookup(&Value::Object(collection_info.clone()), "options.validator.$jsonSchema") {
        None => Ok(Schema::empty()),
        Some(Value::Object(schema)) => Schema::from_document(schema.clone()),
        Some(_) => Err(Error::invalid_input("'$jsonSchema' must be a document")),
    }
}

fn is_view(collection_info: &Document) -> bool {
    collection_info.get("type").and_then(Value::as_str) == Some("view")
        || collection_info
            .get("options")
            .and_then(Value::as_object)
            .is_some_and(|options| options.contains_key("viewOn"))
}

impl EncryptionContext {
    /// Use `schema` instead of looking one up for the namespace.
    ///
    /// Only allowed before [encrypt_init][Self::encrypt_init]. The bytes are handed to the markings service as
    /// given.
    #[cfg_attr(not(test), tracing::instrument(err, skip_all))]
    pub fn set_schema(&mut self, schema: &[u8]) -> Result<()> {
        self.run(|ctx| {
            ctx.guard("set a schema", |state| state == ContextState::Init)?;
            if ctx.local_schema.is_some() {
                return Err(Error::invalid_input("local schema already set"));
            }
            ctx.local_schema = Some(Arc::new(Schema::from_bytes(schema.to_vec())?));
            Ok(())
        })
    }

    /// Start encrypting a command against `namespace` (`database.collection`).
    ///
    /// An empty namespace is invalid.
    #[cfg_attr(not(test), tracing::instrument(err, skip_all))]
    pub fn encrypt_init(&mut self, namespace: &str) -> Result<()> {
        self.run(|ctx| {
            ctx.guard("initialize", |state| state == ContextState::Init)?;
            let namespace = namespace.parse::<Namespace>()?;
            log::debug!(namespace = Obfuscated::from(&namespace); "Initializing encryption context");
            ctx.namespace = Some(namespace.clone());

            if let Some(schema) = ctx.local_schema.clone() {
                return ctx.advance(Phase::NeedMarkings { schema, reply: None });
            }

            ctx.advance(Phase::NeedCollectionInfo { collection_info: None })?;
            let cached = ctx.crypt.schema_cache().get(&namespace)?;
            match cached {
                Some(schema) if schema.is_empty() => {
                    log::debug!(namespace = Obfuscated::from(&namespace); "Cached: no schema");
                    ctx.advance(Phase::NothingToDo)
                }
                Some(schema) => {
                    log::debug!(namespace = Obfuscated::from(&namespace); "Cached schema found");
                    ctx.advance(Phase::NeedMarkings { schema, reply: None })
                }
                None => Ok(()),
            }
        })
    }

    /// The document the caller has to send to the database in the current state:
    ///
    /// - `NeedCollectionInfo`: the listCollections filter
    /// - `NeedMarkings`: the schema to mark the command against
    /// - `NeedKeys`: the key vault filter
    #[cfg_attr(not(test), tracing::instrument(err, skip_all))]
    pub fn mongo_op(&mut self) -> Result<Vec<u8>> {
        self.run(|ctx| {
            ctx.guard("get a mongo operation", ContextState::needs_mongo)?;
            match &ctx.phase {
                Phase::NeedCollectionInfo { .. } => {
                    let collection = ctx.namespace.as_ref().map(Namespace::collection).unwrap_or_default();
                    Ok(serde_json::to_vec(&json!({ "name": collection }))?)
                }
                Phase::NeedMarkings { schema, .. } => Ok(schema.as_bytes().to_vec()),
                Phase::NeedKeys(resolution) => document::to_vec(&resolution.broker.key_filter()),
                phase => Err(Error::WrongState {
                    operation: "get a mongo operation",
                    state: phase.state(),
                }),
            }
        })
    }

    /// Feed one reply document for the current state
    #[cfg_attr(not(test), tracing::instrument(err, skip_all))]
    pub fn mongo_feed(&mut self, reply: &[u8]) -> Result<()> {
        self.run(|ctx| {
            ctx.guard("feed a mongo reply", ContextState::needs_mongo)?;
            let crypt = ctx.crypt.clone();
            match &mut ctx.phase {
                Phase::NeedCollectionInfo { collection_info } => {
                    let document = document::parse_document(reply, "collection info")?;
                    if collection_info.is_some() {
                        return Err(Error::invalid_input("unexpected second collection info document"));
                    }
                    if is_view(&document) {
                        return Err(Error::ViewNotSupported);
                    }
                    *collection_info = Some(document);
                    Ok(())
                }
                Phase::NeedMarkings { reply: markings, .. } => {
                    let document = document::parse_document(reply, "markings reply")?;
                    if markings.is_some() {
                        return Err(Error::invalid_input("unexpected second markings reply"));
                    }
                    *markings = Some(marking::interpret_markings(&document)?);
                    Ok(())
                }
                Phase::NeedKeys(resolution) => {
                    let document = document::parse_document(reply, "key document")?;
                    let key = KeyDocument::parse(&document)?;
                    let provider = key.master_key.provider();
                    if !crypt.configuration().kms_providers().supports(provider) {
                        return Err(Error::invalid_key_document(format!(
                            "{provider} KMS provider is not configured"
                        )));
                    }
                    resolution.broker.add_key_document(key)
                }
                phase => Err(Error::WrongState {
                    operation: "feed a mongo reply",
                    state: phase.state(),
                }),
            }
        })
    }

    /// Signal that every reply of the current state was fed
    #[cfg_attr(not(test), tracing::instrument(err, skip_all))]
    pub fn mongo_done(&mut self) -> Result<()> {
        self.run(|ctx| {
            ctx.guard("finish a mongo operation", ContextState::needs_mongo)?;
            let crypt = ctx.crypt.clone();
            match &mut ctx.phase {
                Phase::NeedCollectionInfo { collection_info } => {
                    let schema = match collection_info.take() {
                        Some(collection_info) => schema_from_collection_info(&collection_info)?,
                        None => Schema::empty(),
                    };
                    let schema = Arc::new(schema);
                    if let Some(namespace) = ctx.namespace.clone() {
                        ctx.crypt.schema_cache().put(namespace, schema.clone())?;
                    }
                    if schema.is_empty() {
                        ctx.advance(Phase::NothingToDo)
                    } else {
                        ctx.advance(Phase::NeedMarkings { schema, reply: None })
                    }
                }
                Phase::NeedMarkings { reply, .. } => {
                    let reply = reply
                        .take()
                        .ok_or_else(|| Error::invalid_input("no markings reply was fed"))?;
                    if !reply.requires_encryption {
                        return ctx.advance(Phase::NothingToDo);
                    }
                    let broker = KeyBroker::new(reply.key_refs().cloned());
                    ctx.advance(Phase::NeedKeys(Resolution {
                        command: reply.command,
                        markings: reply.markings,
                        broker,
                    }))
                }
                Phase::NeedKeys(resolution) => {
                    if !resolution.broker.is_satisfied() {
                        return Err(Error::IncompleteKeys {
                            missing: resolution.broker.unsatisfied().count(),
                        });
                    }
                    if let Some(local) = &crypt.configuration().kms_providers().local {
                        resolution.broker.decrypt_local(&local.key)?;
                    }
                    let resolution = std::mem::take(resolution);
                    if resolution.broker.is_decryption_complete() {
                        ctx.advance(Phase::Ready(resolution))
                    } else {
                        ctx.advance(Phase::NeedKms(resolution))
                    }
                }
                phase => Err(Error::WrongState {
                    operation: "finish a mongo operation",
                    state: phase.state(),
                }),
            }
        })
    }

    /// The KMS decryptions the caller has to perform, one per pending data key
    #[cfg_attr(not(test), tracing::instrument(err, skip_all))]
    pub fn kms_requests(&mut self) -> Result<Vec<KmsRequest>> {
        self.run(|ctx| {
            ctx.guard("list KMS requests", |state| state == ContextState::NeedKms)?;
            let endpoint = ctx
                .crypt
                .configuration()
                .kms_providers()
                .aws
                .as_ref()
                .and_then(|aws| aws.endpoint.clone());
            match &ctx.phase {
                Phase::NeedKms(resolution) => resolution.broker.kms_requests(endpoint.as_deref()),
                phase => Err(Error::WrongState {
                    operation: "list KMS requests",
                    state: phase.state(),
                }),
            }
        })
    }

    /// Hand back the decrypted material of a data key. Once every key is decrypted the context is ready.
    #[cfg_attr(not(test), tracing::instrument(err, skip_all))]
    pub fn supply_decrypted(&mut self, key_id: &KeyId, key_material: &[u8]) -> Result<()> {
        self.run(|ctx| {
            ctx.guard("supply a decrypted key", |state| state == ContextState::NeedKms)?;
            let data_key = DataKey::try_from(key_material)?;
            ctx.supply(key_id, data_key)
        })
    }

    /// Hand back the body of an AWS KMS `Decrypt` reply for a data key
    #[cfg_attr(not(test), tracing::instrument(err, skip_all))]
    pub fn feed_kms_reply(&mut self, key_id: &KeyId, body: &[u8]) -> Result<()> {
        self.run(|ctx| {
            ctx.guard("feed a KMS reply", |state| state == ContextState::NeedKms)?;
            let data_key = kms::parse_aws_reply(body)?;
            ctx.supply(key_id, data_key)
        })
    }

    fn supply(&mut self, key_id: &KeyId, data_key: DataKey) -> Result<()> {
        let Phase::NeedKms(resolution) = &mut self.phase else {
            return Err(Error::WrongState {
                operation: "supply a decrypted key",
                state: self.state(),
            });
        };
        resolution.broker.supply_decrypted(key_id, data_key)?;
        log::debug!(key_id = Obfuscated::from(key_id); "Data key decrypted");
        if !resolution.broker.is_decryption_complete() {
            return Ok(());
        }
        let resolution = std::mem::take(resolution);
        self.advance(Phase::Ready(resolution))
    }

    /// Encrypt every marked value and return the command with ciphertexts in place of placeholders
    #[cfg_attr(not(test), tracing::instrument(err, skip_all))]
    pub fn finalize(&mut self) -> Result<Vec<u8>> {
        self.run(|ctx| {
            ctx.guard("finalize", |state| state == ContextState::Ready)?;
            let Phase::Ready(resolution) = &ctx.phase else {
                return Err(Error::WrongState {
                    operation: "finalize",
                    state: ctx.state(),
                });
            };

            let mut command = Value::Object(resolution.command.clone());
            for marking in &resolution.markings {
                let (key_id, data_key) = resolution
                    .broker
                    .data_key(&marking.key)
                    .ok_or_else(|| Error::Kms(format!("no decrypted key for {}", marking.key)))?;
                let ciphertext = cipher::encrypt_value(data_key, key_id, marking.algorithm, &marking.value)?;
                marking.path.replace(&mut command, ciphertext.to_binary_value())?;
            }
            let output = serde_json::to_vec(&command)?;

            log::debug!(
                namespace:? = ctx.namespace.as_ref().map(Obfuscated::from),
                markings = resolution.markings.len();
                "Command encrypted"
            );
            ctx.advance(Phase::Done)?;
            Ok(output)
        })
    }
}
