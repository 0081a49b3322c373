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

use aes_gcm::{aead::Aead as _, Aes256Gcm, KeyInit as _};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::{Digest as _, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    ciphertext::{Algorithm, Ciphertext, ValueType},
    identifiers::KeyId,
    Error, Result,
};

pub(crate) const AES_GCM_256_NONCE_SIZE: usize = 12;
const ENCRYPTION_KEY_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Decrypted data key material.
///
/// The first half keys the cipher, the second half derives deterministic nonces.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataKey([u8; Self::LEN]);

impl DataKey {
    /// Length of a decrypted data key
    pub const LEN: usize = 64;

    /// A fresh random data key
    pub fn generate() -> Self {
        let mut key = [0; Self::LEN];
        rand::Rng::fill(&mut rand::thread_rng(), &mut key[..]);
        Self(key)
    }

    fn encryption_key(&self) -> &[u8] {
        &self.0[..ENCRYPTION_KEY_LEN]
    }

    fn nonce_key(&self) -> &[u8] {
        &self.0[ENCRYPTION_KEY_LEN..]
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(self.encryption_key()))
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str("DataKey(hash=")?;
        for x in Sha256::digest(&self.0).as_slice().iter().take(10) {
            fmt::LowerHex::fmt(x, f)?
        }
        f.write_str("...)")
    }
}

impl AsRef<[u8]> for DataKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for DataKey {
    type Error = Error;

    fn try_from(buf: &[u8]) -> Result<Self, Self::Error> {
        let key = <[u8; Self::LEN]>::try_from(buf).map_err(|_| {
            Error::Kms(format!(
                "decrypted key is incorrect length: expected {} bytes, got {}",
                Self::LEN,
                buf.len()
            ))
        })?;
        Ok(Self(key))
    }
}

fn associated_data(algorithm: Algorithm, key_id: &KeyId, value_type: ValueType) -> Vec<u8> {
    let mut aad = Vec::with_capacity(crate::ciphertext::HEADER_LEN);
    aad.push(algorithm as u8);
    aad.extend_from_slice(key_id.as_bytes());
    aad.push(value_type as u8);
    aad
}

fn deterministic_nonce(key: &DataKey, aad: &[u8], plaintext: &[u8]) -> Result<[u8; AES_GCM_256_NONCE_SIZE]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.nonce_key()).map_err(|_| Error::Crypto("invalid nonce key"))?;
    mac.update(aad);
    mac.update(plaintext);
    let digest = mac.finalize().into_bytes();
    let mut nonce = [0; AES_GCM_256_NONCE_SIZE];
    nonce.copy_from_slice(&digest[..AES_GCM_256_NONCE_SIZE]);
    Ok(nonce)
}

// Payload layout: [12 bytes of nonce..., ...encrypted value and tag]
// The ciphertext header is authenticated as associated data.
/// Encrypt a single field value under `key`.
///
/// Null values carry no information worth protecting and cannot be encrypted.
pub fn encrypt_value(key: &DataKey, key_id: KeyId, algorithm: Algorithm, value: &Value) -> Result<Ciphertext> {
    let value_type = ValueType::of(value);
    if value_type == ValueType::Null {
        return Err(Error::invalid_input("cannot encrypt a null value"));
    }
    let msg = serde_json::to_vec(value)?;
    let aad = associated_data(algorithm, &key_id, value_type);
    let nonce: [u8; AES_GCM_256_NONCE_SIZE] = match algorithm {
        Algorithm::Deterministic => deterministic_nonce(key, &aad, &msg)?,
        Algorithm::Random => rand::random(),
    };

    let payload = aes_gcm::aead::Payload { msg: &msg, aad: &aad };
    let mut encrypted = key
        .cipher()
        .encrypt(aes_gcm::Nonce::from_slice(&nonce), payload)
        .map_err(|_| Error::Crypto("AES-GCM encryption failed"))?;
    let mut data = Vec::with_capacity(nonce.len() + encrypted.len());
    data.extend_from_slice(&nonce);
    data.append(&mut encrypted);

    Ok(Ciphertext {
        algorithm,
        key_id,
        value_type,
        data,
    })
}

/// Decrypt a ciphertext produced by [encrypt_value] and restore the original value
pub fn decrypt_value(key: &DataKey, ciphertext: &Ciphertext) -> Result<Value> {
    if ciphertext.data.len() < AES_GCM_256_NONCE_SIZE {
        return Err(Error::Crypto("ciphertext payload shorter than its nonce"));
    }
    let (nonce, msg) = ciphertext.data.split_at(AES_GCM_256_NONCE_SIZE);
    let aad = associated_data(ciphertext.algorithm, &ciphertext.key_id, ciphertext.value_type);
    let payload = aes_gcm::aead::Payload { msg, aad: &aad };
    let cleartext = key
        .cipher()
        .decrypt(aes_gcm::Nonce::from_slice(nonce), payload)
        .map_err(|_| Error::Crypto("AES-GCM decryption failed"))?;

    let value: Value = serde_json::from_slice(&cleartext)?;
    if ValueType::of(&value) != ciphertext.value_type {
        return Err(Error::Crypto("decrypted value does not match its recorded type"));
    }
    Ok(value)
}
