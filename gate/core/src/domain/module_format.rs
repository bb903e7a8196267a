// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Module Format
//!
//! Structural checks for WebAssembly binary modules.
//!
//! - [`check_header`] looks at the 8-byte preamble only: magic `\0asm` and
//!   little-endian version `1`.
//! - [`validate`] runs the full `wasmparser` validator over the module and
//!   then records the section layout. Anything the validator rejects
//!   (malformed LEB128, bad section order, ill-typed function bodies) is a
//!   [`FormatError::Malformed`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wasmparser::{BinaryReaderError, Parser, Payload, Validator};

pub const WASM_MAGIC: [u8; 4] = *b"\0asm";
pub const WASM_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 8;

const CUSTOM_SECTION: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Module is {len} bytes; a header needs {}", HEADER_LEN)]
    TooShort { len: usize },

    #[error("Bad magic number: not a WebAssembly module")]
    BadMagic,

    #[error("Unsupported module version {0}")]
    UnsupportedVersion(u32),

    #[error("Malformed module at offset {offset}: {message}")]
    Malformed { offset: usize, message: String },
}

impl From<BinaryReaderError> for FormatError {
    fn from(err: BinaryReaderError) -> Self {
        FormatError::Malformed {
            offset: err.offset(),
            message: err.message().to_string(),
        }
    }
}

/// Position and size of one section, as found by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionHeader {
    pub id: u8,
    /// Offset of the section payload, relative to the start of the module.
    pub offset: usize,
    pub size: usize,
    pub custom_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleLayout {
    pub sections: Vec<SectionHeader>,
}

impl ModuleLayout {
    pub fn custom_section(&self, name: &str) -> Option<&SectionHeader> {
        self.sections
            .iter()
            .find(|s| s.custom_name.as_deref() == Some(name))
    }
}

/// Check only the 8-byte header.
pub fn check_header(bytes: &[u8]) -> Result<(), FormatError> {
    if bytes.len() < HEADER_LEN {
        return Err(FormatError::TooShort { len: bytes.len() });
    }
    if bytes[..4] != WASM_MAGIC {
        return Err(FormatError::BadMagic);
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != WASM_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }
    Ok(())
}

/// Validate a whole module and return its section layout.
pub fn validate(bytes: &[u8]) -> Result<ModuleLayout, FormatError> {
    check_header(bytes)?;
    Validator::new().validate_all(bytes)?;

    let mut sections = Vec::new();
    for payload in Parser::new(0).parse_all(bytes) {
        let payload = payload?;
        let custom_name = match &payload {
            Payload::CustomSection(reader) => Some(reader.name().to_string()),
            _ => None,
        };
        if let Some((id, range)) = payload.as_section() {
            debug_assert!(custom_name.is_none() || id == CUSTOM_SECTION);
            sections.push(SectionHeader {
                id,
                offset: range.start,
                size: range.end - range.start,
                custom_name,
            });
        }
    }

    Ok(ModuleLayout { sections })
}
