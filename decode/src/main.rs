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

use base64::Engine;
use clap::{Parser, Subcommand};
use clap_stdin::FileOrStdin;
use field_crypt::prelude::*;
use serde_json::Value;

#[derive(Debug)]
#[allow(dead_code)]
struct DecodedCiphertext {
    algorithm: Algorithm,
    key_id: String,
    value_type: ValueType,
    payload_len: usize,
    payload: String,
}

impl From<Ciphertext> for DecodedCiphertext {
    fn from(ciphertext: Ciphertext) -> Self {
        Self {
            algorithm: ciphertext.algorithm,
            key_id: ciphertext.key_id.to_string(),
            value_type: ciphertext.value_type,
            payload_len: ciphertext.data.len(),
            payload: base64::prelude::BASE64_STANDARD.encode(&ciphertext.data),
        }
    }
}

#[derive(Debug)]
#[allow(dead_code)]
struct DecodedMarking {
    algorithm: Algorithm,
    key: KeyRef,
    value: Value,
}

impl From<Marking> for DecodedMarking {
    fn from(marking: Marking) -> Self {
        Self {
            algorithm: marking.algorithm,
            key: marking.key,
            value: marking.value,
        }
    }
}

/// Utility for decoding the binary values produced by field level encryption
#[derive(Parser, Debug)]
#[clap(name = "decode", version)]
pub struct App {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decode and display a ciphertext
    Ciphertext {
        /// File containing a base64 encoded ciphertext or its extended JSON binary, or `-` to read from stdin.
        ciphertext: FileOrStdin<String>,
    },
    /// Decode and display a placeholder emitted by the markings service
    Marking {
        /// File containing a base64 encoded placeholder or its extended JSON binary, or `-` to read from stdin.
        placeholder: FileOrStdin<String>,
    },
}

/// Read either an extended JSON binary or a bare base64 payload, which is given `subtype`
fn read_binary(input: &str, subtype: u8) -> Result<Value, Box<dyn std::error::Error>> {
    let input = input.trim();
    if input.starts_with('{') {
        return Ok(serde_json::from_str(input)?);
    }
    let bytes = base64::prelude::BASE64_STANDARD.decode(input)?;
    Ok(Binary::new(subtype, bytes).to_value())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let app = App::parse();
    match app.command {
        Command::Ciphertext { ciphertext } => {
            let input: String = ciphertext.contents()?;
            let value = read_binary(&input, field_crypt::document::BINARY_SUBTYPE_ENCRYPTED)?;
            let ciphertext = Ciphertext::from_binary_value(&value).map_err(|e| e.innermost_error_message())?;
            println!("{:#?}", DecodedCiphertext::from(ciphertext));
            Ok(())
        }
        Command::Marking { placeholder } => {
            let input: String = placeholder.contents()?;
            let value = read_binary(&input, field_crypt::document::BINARY_SUBTYPE_ENCRYPTED)?;
            let marking =
                Marking::parse_placeholder(FieldPath::root(), &value).map_err(|e| e.innermost_error_message())?;
            println!("{:#?}", DecodedMarking::from(marking));
            Ok(())
        }
    }
}
