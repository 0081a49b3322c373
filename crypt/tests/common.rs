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

#![allow(dead_code, unused_imports)]

pub(crate) use field_crypt::prelude::*;
pub(crate) use rstest::*;

pub(crate) const NAMESPACE: &str = "test.test";

/// A fixture file from `tests/data`
pub(crate) fn data(name: &str) -> Vec<u8> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

pub(crate) fn json(name: &str) -> serde_json::Value {
    serde_json::from_slice(&data(name)).unwrap()
}

/// The id of the key every fixture refers to
pub(crate) fn fixture_key_id() -> KeyId {
    KeyId::from_bytes(*b"aaaaaaaaaaaaaaaa")
}

#[fixture]
pub(crate) fn crypt() -> Crypt {
    let _ = pretty_env_logger::try_init();
    let config = CryptConfiguration::builder()
        .kms_providers(
            KmsProviders::builder()
                .aws(AwsSettings::default())
                .local(LocalSettings {
                    key: LocalMasterKey::generate(),
                })
                .build(),
        )
        .build();
    Crypt::try_new(config).unwrap()
}

/// Drive `ctx` with the fixtures of `tests/data` until it reaches `target`.
///
/// Panics if a step fails or the context ends up somewhere else.
pub(crate) fn run_ctx_to(ctx: &mut EncryptionContext, target: ContextState) {
    while ctx.state() != target {
        match ctx.state() {
            ContextState::Init => ctx.encrypt_init(NAMESPACE).unwrap(),
            ContextState::NeedCollectionInfo => {
                ctx.mongo_feed(&data("collection-info.json")).unwrap();
                ctx.mongo_done().unwrap();
            }
            ContextState::NeedMarkings => {
                ctx.mongo_feed(&data("mongocryptd-reply.json")).unwrap();
                ctx.mongo_done().unwrap();
            }
            ContextState::NeedKeys => {
                ctx.mongo_feed(&data("key-document.json")).unwrap();
                ctx.mongo_done().unwrap();
            }
            ContextState::NeedKms => {
                for request in ctx.kms_requests().unwrap() {
                    ctx.feed_kms_reply(&request.key_id(), &data("kms-reply.json")).unwrap();
                }
            }
            ContextState::Ready => {
                ctx.finalize().unwrap();
            }
            state => panic!("cannot reach {target} from {state}"),
        }
    }
}
