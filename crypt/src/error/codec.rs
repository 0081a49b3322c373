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

/// Errors raised while decoding binary ciphertexts and extended JSON binaries
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The buffer is shorter than the fixed ciphertext header
    #[error("ciphertext too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum length
        expected: usize,
        /// Length of the buffer we were handed
        actual: usize,
    },
    /// The leading byte is not a ciphertext algorithm tag
    #[error("unexpected ciphertext subtype {0:#04x}")]
    UnexpectedSubtype(u8),
    /// The original value type byte is not one we know how to restore
    #[error("unknown value type {0:#04x}")]
    UnknownValueType(u8),
    /// The extended JSON binary does not carry the expected subtype
    #[error("expected binary subtype {expected:#04x}, got {actual:#04x}")]
    UnexpectedBinarySubtype {
        /// Subtype required by the caller
        expected: u8,
        /// Subtype found in the value
        actual: u8,
    },
    /// A key id does not have the fixed identifier length
    #[error("invalid key id length: expected {expected} bytes, got {actual}")]
    InvalidKeyIdLength {
        /// Fixed key id length
        expected: usize,
        /// Length found
        actual: usize,
    },
    /// The value is not an extended JSON `$binary`
    #[error("value is not an extended JSON binary: {0}")]
    NotBinary(&'static str),
    /// The binary payload is not valid base64
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
}
