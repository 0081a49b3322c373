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

use aes_gcm::{aead::Aead as _, Aes256Gcm, KeyInit as _};
use base64::{prelude::BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize as _;

use crate::{
    cipher::{DataKey, AES_GCM_256_NONCE_SIZE},
    config::LocalMasterKey,
    identifiers::KeyId,
    key::KmsProvider,
    Error, Result,
};

/// A decryption the caller has to perform against a KMS on behalf of a context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmsRequest {
    key_id: KeyId,
    provider: KmsProvider,
    endpoint: String,
    message: Vec<u8>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AwsDecryptRequest<'a> {
    key_id: &'a str,
    ciphertext_blob: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsDecryptReply {
    plaintext: Option<String>,
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "message")]
    message: Option<String>,
}

impl KmsRequest {
    /// Describe an AWS KMS `Decrypt` call for `key_material`.
    ///
    /// `endpoint` overrides the regional `kms.<region>.amazonaws.com` host.
    pub(crate) fn aws(
        key_id: KeyId,
        region: &str,
        cmk: &str,
        endpoint: Option<&str>,
        key_material: &[u8],
    ) -> Result<Self> {
        let message = serde_json::to_vec(&AwsDecryptRequest {
            key_id: cmk,
            ciphertext_blob: BASE64_STANDARD.encode(key_material),
        })?;
        let endpoint = endpoint
            .map(str::to_owned)
            .unwrap_or_else(|| format!("kms.{region}.amazonaws.com"));
        Ok(Self {
            key_id,
            provider: KmsProvider::Aws,
            endpoint,
            message,
        })
    }

    /// The data key this request decrypts
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// The provider to send the request to
    pub fn provider(&self) -> KmsProvider {
        self.provider
    }

    /// Host to send the request to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Request body
    pub fn message(&self) -> &[u8] {
        &self.message
    }
}

/// Extract the plaintext data key from the body of an AWS KMS `Decrypt` reply
pub fn parse_aws_reply(body: &[u8]) -> Result<DataKey> {
    if body.is_empty() {
        return Err(Error::Kms("empty KMS reply".into()));
    }
    let reply: AwsDecryptReply =
        serde_json::from_slice(body).map_err(|e| Error::Kms(format!("KMS reply is not valid JSON: {e}")))?;
    match reply {
        AwsDecryptReply {
            plaintext: Some(plaintext),
            ..
        } => {
            let mut bytes = BASE64_STANDARD
                .decode(plaintext)
                .map_err(|e| Error::Kms(format!("'Plaintext' is not base64: {e}")))?;
            let key = DataKey::try_from(bytes.as_slice());
            bytes.zeroize();
            key
        }
        AwsDecryptReply {
            error_type, message, ..
        } => Err(Error::Kms(format!(
            "{}: {}",
            error_type.as_deref().unwrap_or("KMS error"),
            message.as_deref().unwrap_or("no 'Plaintext' in reply")
        ))),
    }
}

fn local_cipher(master_key: &LocalMasterKey) -> Aes256Gcm {
    Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(master_key.as_ref()))
}

/// Wrap a data key with the local master key, producing `keyMaterial` for a `local` key document
pub fn wrap_local_key(master_key: &LocalMasterKey, key_id: &KeyId, data_key: &DataKey) -> Result<Vec<u8>> {
    let nonce: [u8; AES_GCM_256_NONCE_SIZE] = rand::random();
    let payload = aes_gcm::aead::Payload {
        msg: data_key.as_ref(),
        aad: key_id.as_bytes(),
    };
    let mut encrypted = local_cipher(master_key)
        .encrypt(aes_gcm::Nonce::from_slice(&nonce), payload)
        .map_err(|_| Error::Crypto("AES-GCM encryption failed"))?;
    let mut material = Vec::with_capacity(nonce.len() + encrypted.len());
    material.extend_from_slice(&nonce);
    material.append(&mut encrypted);
    Ok(material)
}

/// Unwrap the `keyMaterial` of a `local` key document
pub fn unwrap_local_key(master_key: &LocalMasterKey, key_id: &KeyId, key_material: &[u8]) -> Result<DataKey> {
    if key_material.len() < AES_GCM_256_NONCE_SIZE {
        return Err(Error::Kms("local key material shorter than its nonce".into()));
    }
    let (nonce, msg) = key_material.split_at(AES_GCM_256_NONCE_SIZE);
    let payload = aes_gcm::aead::Payload {
        msg,
        aad: key_id.as_bytes(),
    };
    let mut plaintext = local_cipher(master_key)
        .decrypt(aes_gcm::Nonce::from_slice(nonce), payload)
        .map_err(|_| Error::Kms("cannot unwrap local key with the configured master key".into()))?;
    let key = DataKey::try_from(plaintext.as_slice());
    plaintext.zeroize();
    key
}
