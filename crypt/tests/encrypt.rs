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

mod common;

mod encrypt {
    use serde_json::{json, Value};

    use super::common::*;
    use field_crypt::{cipher, document::lookup, kms};

    fn ciphertext_at(output: &[u8], path: &str) -> Ciphertext {
        let output: Value = serde_json::from_slice(output).unwrap();
        Ciphertext::from_binary_value(lookup(&output, path).unwrap()).unwrap()
    }

    fn fails_with(ctx: &EncryptionContext, result: Result<()>, message: &str) {
        let err = result.unwrap_err();
        assert!(err.to_string().contains(message), "{err} does not contain {message:?}");
        assert_eq!(ctx.state(), ContextState::Error);
    }

    #[rstest]
    fn init(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        ctx.encrypt_init(NAMESPACE).unwrap();
        assert_eq!(ctx.state(), ContextState::NeedCollectionInfo);
        assert_eq!(ctx.namespace().unwrap().collection(), "test");

        let mut ctx = crypt.new_encryption_context();
        let result = ctx.encrypt_init("invalidnamespace");
        fails_with(&ctx, result, "invalid namespace");

        let mut ctx = crypt.new_encryption_context();
        let result = ctx.encrypt_init("");
        fails_with(&ctx, result, "invalid namespace");

        let mut ctx = crypt.new_encryption_context();
        ctx.encrypt_init(NAMESPACE).unwrap();
        let result = ctx.encrypt_init(NAMESPACE);
        fails_with(&ctx, result, "while the context is in state");
    }

    #[rstest]
    fn need_collection_info(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedCollectionInfo);
        let op: Value = serde_json::from_slice(&ctx.mongo_op().unwrap()).unwrap();
        assert_eq!(op, json!({ "name": "test" }));
        ctx.mongo_feed(&data("collection-info.json")).unwrap();
        ctx.mongo_done().unwrap();
        assert_eq!(ctx.state(), ContextState::NeedMarkings);
    }

    #[rstest]
    fn need_collection_info_without_schema(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedCollectionInfo);
        ctx.mongo_feed(&data("collection-info-no-schema.json")).unwrap();
        ctx.mongo_done().unwrap();
        assert_eq!(ctx.state(), ContextState::NothingToDo);
    }

    #[rstest]
    fn need_collection_info_invalid_input(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedCollectionInfo);
        let result = ctx.mongo_feed(&[]);
        fails_with(&ctx, result, "invalid NULL");

        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedCollectionInfo);
        ctx.mongo_feed(&data("collection-info.json")).unwrap();
        let result = ctx.mongo_feed(&data("collection-info.json"));
        fails_with(&ctx, result, "second collection info");
    }

    #[rstest]
    fn need_collection_info_wrong_state(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedKms);
        let result = ctx.mongo_feed(&data("collection-info.json"));
        fails_with(&ctx, result, "while the context is in state NeedKms");
    }

    #[rstest]
    fn need_markings(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedMarkings);
        ctx.mongo_feed(&data("mongocryptd-reply.json")).unwrap();
        ctx.mongo_done().unwrap();
        assert_eq!(ctx.state(), ContextState::NeedKeys);
    }

    #[rstest]
    #[case("mongocryptd-reply-no-markings.json")]
    #[case("mongocryptd-reply-no-encryption-needed.json")]
    fn need_markings_nothing_to_do(crypt: Crypt, #[case] reply: &str) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedMarkings);
        ctx.mongo_feed(&data(reply)).unwrap();
        ctx.mongo_done().unwrap();
        assert_eq!(ctx.state(), ContextState::NothingToDo);
    }

    #[rstest]
    fn need_markings_invalid_input(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedMarkings);
        let result = ctx.mongo_feed(&data("mongocryptd-reply-invalid.json"));
        fails_with(&ctx, result, "no 'v'");
        assert_eq!(ctx.status().unwrap().kind(), ErrorKind::MalformedMarking);

        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedMarkings);
        let result = ctx.mongo_feed(&[]);
        fails_with(&ctx, result, "invalid NULL");
    }

    #[rstest]
    #[case("schemaRequiresEncryption")]
    #[case("hasEncryptedPlaceholders")]
    fn need_markings_reply_without_flags(crypt: Crypt, #[case] flag: &str) {
        let mut reply: Value = serde_json::from_slice(&data("mongocryptd-reply.json")).unwrap();
        reply.as_object_mut().unwrap().remove(flag);

        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedMarkings);
        let result = ctx.mongo_feed(&serde_json::to_vec(&reply).unwrap());
        fails_with(&ctx, result, &format!("no '{flag}'"));
        assert_eq!(ctx.status().unwrap().kind(), ErrorKind::MalformedMarking);
        assert!(ctx.mongo_done().is_err());
        assert_eq!(ctx.state(), ContextState::Error);
    }

    #[rstest]
    fn need_markings_wrong_state(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedKms);
        let result = ctx.mongo_feed(&data("mongocryptd-reply.json"));
        fails_with(&ctx, result, "while the context is in state NeedKms");
    }

    #[rstest]
    fn need_keys(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedKeys);
        let filter: Value = serde_json::from_slice(&ctx.mongo_op().unwrap()).unwrap();
        assert_eq!(filter["$or"][0]["_id"]["$in"][0], fixture_key_id().to_binary_value());

        ctx.mongo_feed(&data("key-document.json")).unwrap();
        ctx.mongo_done().unwrap();
        assert_eq!(ctx.state(), ContextState::NeedKms);

        let requests = ctx.kms_requests().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].key_id(), fixture_key_id());
        assert_eq!(requests[0].endpoint(), "kms.us-east-1.amazonaws.com");
    }

    #[rstest]
    fn need_keys_missing(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedKeys);
        let result = ctx.mongo_done();
        fails_with(&ctx, result, "did not provide all keys");
    }

    #[rstest]
    fn ready(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::Ready);
        let output = ctx.finalize().unwrap();
        assert_eq!(ctx.state(), ContextState::Done);

        let ciphertext = ciphertext_at(&output, "filter.ssn");
        assert_eq!(ciphertext.key_id, fixture_key_id());
        assert_eq!(ciphertext.algorithm, Algorithm::Deterministic);
        assert_eq!(ciphertext.value_type, ValueType::String);

        let data_key = kms::parse_aws_reply(&data("kms-reply.json")).unwrap();
        assert_eq!(cipher::decrypt_value(&data_key, &ciphertext).unwrap(), json!("457-55-5462"));

        let output: Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(output["find"], json!("test"));
    }

    #[rstest]
    fn deterministic_output_is_stable(crypt: Crypt) {
        let mut outputs = vec![];
        for _ in 0..2 {
            let mut ctx = crypt.new_encryption_context();
            run_ctx_to(&mut ctx, ContextState::Ready);
            outputs.push(ctx.finalize().unwrap());
        }
        assert_eq!(
            ciphertext_at(&outputs[0], "filter.ssn"),
            ciphertext_at(&outputs[1], "filter.ssn")
        );
    }

    #[rstest]
    fn key_missing_region(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedKeys);
        let result = ctx.mongo_feed(&data("key-document-no-region.json"));
        fails_with(&ctx, result, "no key region");
    }

    #[rstest]
    fn view(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedCollectionInfo);
        let result = ctx.mongo_feed(&data("collection-info-view.json"));
        fails_with(&ctx, result, "cannot auto encrypt a view");
    }

    #[rstest]
    fn local_schema(crypt: Crypt) {
        let schema = data("schema.json");
        let mut ctx = crypt.new_encryption_context();
        ctx.set_schema(&schema).unwrap();
        ctx.encrypt_init(NAMESPACE).unwrap();
        assert_eq!(ctx.state(), ContextState::NeedMarkings);
        assert_eq!(ctx.mongo_op().unwrap(), schema);
        run_ctx_to(&mut ctx, ContextState::Done);
    }

    #[rstest]
    fn schema_cache_hit_skips_collection_info(crypt: Crypt) {
        let mut first = crypt.new_encryption_context();
        run_ctx_to(&mut first, ContextState::NeedMarkings);
        assert_eq!(crypt.schema_cache().len().unwrap(), 1);

        let mut second = crypt.new_encryption_context();
        second.encrypt_init(NAMESPACE).unwrap();
        assert_eq!(second.state(), ContextState::NeedMarkings);
        let schema: Value = serde_json::from_slice(&second.mongo_op().unwrap()).unwrap();
        assert_eq!(schema, json("schema.json"));
    }

    #[rstest]
    fn cached_absent_schema_is_nothing_to_do(crypt: Crypt) {
        let mut first = crypt.new_encryption_context();
        run_ctx_to(&mut first, ContextState::NeedCollectionInfo);
        first.mongo_feed(&data("collection-info-no-schema.json")).unwrap();
        first.mongo_done().unwrap();

        let mut second = crypt.new_encryption_context();
        second.encrypt_init(NAMESPACE).unwrap();
        assert_eq!(second.state(), ContextState::NothingToDo);
    }

    fn markings_reply(placeholders: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "schemaRequiresEncryption": true,
            "hasEncryptedPlaceholders": true,
            "ok": 1,
            "result": { "insert": "test", "documents": [placeholders] }
        }))
        .unwrap()
    }

    fn placeholder(value: Value, algorithm: Algorithm, key: KeyRef) -> Value {
        Marking {
            path: FieldPath::root(),
            value,
            algorithm,
            key,
        }
        .to_placeholder()
        .unwrap()
    }

    #[rstest]
    fn refeeding_a_key_without_alt_names_leaves_keys_incomplete(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedMarkings);
        ctx.mongo_feed(&markings_reply(json!({
            "ssn": placeholder(json!("457-55-5462"), Algorithm::Deterministic, KeyRef::Id(fixture_key_id())),
            "address": placeholder(json!("Berlin"), Algorithm::Random, KeyRef::AltName("payroll".into())),
        })))
        .unwrap();
        ctx.mongo_done().unwrap();

        let mut key: Value = serde_json::from_slice(&data("key-document.json")).unwrap();
        ctx.mongo_feed(&serde_json::to_vec(&key).unwrap()).unwrap();
        key.as_object_mut().unwrap().remove("keyAltNames");
        ctx.mongo_feed(&serde_json::to_vec(&key).unwrap()).unwrap();

        let result = ctx.mongo_done();
        fails_with(&ctx, result, "1 key reference(s) left unresolved");
        assert_eq!(ctx.status().unwrap().kind(), ErrorKind::IncompleteKeys);
    }

    #[rstest]
    fn references_to_one_key_share_a_kms_request(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedMarkings);
        ctx.mongo_feed(&markings_reply(json!({
            "ssn": placeholder(json!("457-55-5462"), Algorithm::Deterministic, KeyRef::Id(fixture_key_id())),
            "salary": placeholder(json!(100_000), Algorithm::Random, KeyRef::Id(fixture_key_id())),
            "address": placeholder(json!({"city": "Berlin"}), Algorithm::Random, KeyRef::AltName("payroll".into())),
        })))
        .unwrap();
        ctx.mongo_done().unwrap();

        let filter: Value = serde_json::from_slice(&ctx.mongo_op().unwrap()).unwrap();
        assert_eq!(filter["$or"][0]["_id"]["$in"].as_array().unwrap().len(), 1);
        assert_eq!(filter["$or"][1]["keyAltNames"]["$in"], json!(["payroll"]));

        ctx.mongo_feed(&data("key-document.json")).unwrap();
        ctx.mongo_done().unwrap();
        let requests = ctx.kms_requests().unwrap();
        assert_eq!(requests.len(), 1);

        ctx.feed_kms_reply(&requests[0].key_id(), &data("kms-reply.json")).unwrap();
        assert_eq!(ctx.state(), ContextState::Ready);

        let output = ctx.finalize().unwrap();
        let data_key = kms::parse_aws_reply(&data("kms-reply.json")).unwrap();
        for (path, expected) in [
            ("documents.0.ssn", json!("457-55-5462")),
            ("documents.0.salary", json!(100_000)),
            ("documents.0.address", json!({"city": "Berlin"})),
        ] {
            let ciphertext = ciphertext_at(&output, path);
            assert_eq!(ciphertext.key_id, fixture_key_id());
            assert_eq!(cipher::decrypt_value(&data_key, &ciphertext).unwrap(), expected);
        }
    }

    #[rstest]
    fn supplied_key_material_must_be_a_data_key(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedKms);
        let result = ctx.supply_decrypted(&fixture_key_id(), &[0; 16]);
        fails_with(&ctx, result, "incorrect length");
        assert_eq!(ctx.status().unwrap().kind(), ErrorKind::Kms);
    }

    #[rstest]
    fn supply_decrypted_reaches_ready(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedKms);
        ctx.supply_decrypted(&fixture_key_id(), DataKey::generate().as_ref()).unwrap();
        assert_eq!(ctx.state(), ContextState::Ready);
        run_ctx_to(&mut ctx, ContextState::Done);
    }

    #[rstest]
    fn kms_error_reply_fails_the_context(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedKms);
        let result = ctx.feed_kms_reply(
            &fixture_key_id(),
            br#"{"__type": "AccessDeniedException", "Message": "denied"}"#,
        );
        fails_with(&ctx, result, "AccessDeniedException");
    }

    #[rstest]
    fn status_survives_later_calls(crypt: Crypt) {
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedCollectionInfo);
        let _ = ctx.mongo_feed(&data("collection-info-view.json"));
        let status = ctx.status().cloned().unwrap();
        assert_eq!(status.kind(), ErrorKind::ViewNotSupported);

        for err in [ctx.mongo_done().unwrap_err(), ctx.finalize().unwrap_err()] {
            assert_eq!(err.kind(), ErrorKind::WrongState);
            assert_eq!(err.to_string(), status.to_string());
        }
        assert_eq!(ctx.status(), Some(&status));
    }

    #[rstest]
    fn unconfigured_provider_is_rejected() {
        let config = CryptConfiguration::builder()
            .kms_providers(
                KmsProviders::builder()
                    .local(LocalSettings {
                        key: LocalMasterKey::generate(),
                    })
                    .build(),
            )
            .build();
        let crypt = Crypt::try_new(config).unwrap();
        let mut ctx = crypt.new_encryption_context();
        run_ctx_to(&mut ctx, ContextState::NeedKeys);
        let result = ctx.mongo_feed(&data("key-document.json"));
        fails_with(&ctx, result, "aws KMS provider is not configured");
    }
}
