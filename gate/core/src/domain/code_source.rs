// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Code Source Value Object
//!
//! A [`CodeSource`] identifies where a module came from: the location it was
//! fetched from plus the identities that signed it. It is the key of the
//! protection-domain cache, so equality is by value: two sources are equal when
//! their locations are equal and they carry the same set of signers, in any
//! order.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum CodeSourceError {
    #[error("Invalid code source location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("Invalid signer fingerprint '{0}': expected 64 hex characters")]
    InvalidFingerprint(String),
}

/// A certificate identity that signed a module.
///
/// Identity is the SHA-256 fingerprint of the DER certificate; `subject` is
/// carried for display only and does not take part in equality.
/// Deserialization goes through [`Signer::from_fingerprint`], so a decoded
/// signer is normalized exactly like a constructed one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SignerRepr")]
pub struct Signer {
    pub subject: String,
    fingerprint: String,
}

#[derive(Deserialize)]
struct SignerRepr {
    subject: String,
    fingerprint: String,
}

impl TryFrom<SignerRepr> for Signer {
    type Error = CodeSourceError;

    fn try_from(repr: SignerRepr) -> Result<Self, Self::Error> {
        Signer::from_fingerprint(repr.subject, &repr.fingerprint)
    }
}

impl Signer {
    /// Build a signer from a known fingerprint (hex, case-insensitive).
    pub fn from_fingerprint(
        subject: impl Into<String>,
        fingerprint: &str,
    ) -> Result<Self, CodeSourceError> {
        let normalized = fingerprint.trim().to_ascii_lowercase();
        if normalized.len() != 64 || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CodeSourceError::InvalidFingerprint(fingerprint.to_string()));
        }
        Ok(Self {
            subject: subject.into(),
            fingerprint: normalized,
        })
    }

    /// Build a signer from the DER encoding of its certificate.
    pub fn from_der(subject: impl Into<String>, der: &[u8]) -> Self {
        Self {
            subject: subject.into(),
            fingerprint: hex::encode(Sha256::digest(der)),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl PartialEq for Signer {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for Signer {}

impl Hash for Signer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}

impl PartialOrd for Signer {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Signer {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.fingerprint.cmp(&other.fingerprint)
    }
}

impl fmt::Display for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.fingerprint.get(..16).unwrap_or(&self.fingerprint);
        write!(f, "{} ({})", self.subject, short)
    }
}

/// Origin descriptor of a module: location plus signer set.
///
/// Immutable once constructed. Cheap to clone relative to the work it keys
/// (a policy evaluation), and cloned once per cache miss.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeSource {
    location: Url,
    signers: BTreeSet<Signer>,
}

impl CodeSource {
    pub fn new(location: Url, signers: impl IntoIterator<Item = Signer>) -> Self {
        Self {
            location,
            signers: signers.into_iter().collect(),
        }
    }

    /// Parse `location` and attach the given signers.
    pub fn parse(
        location: &str,
        signers: impl IntoIterator<Item = Signer>,
    ) -> Result<Self, CodeSourceError> {
        let url = Url::parse(location).map_err(|e| CodeSourceError::InvalidLocation {
            location: location.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(url, signers))
    }

    /// An unsigned source at `location`.
    pub fn unsigned(location: &str) -> Result<Self, CodeSourceError> {
        Self::parse(location, std::iter::empty())
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn signers(&self) -> &BTreeSet<Signer> {
        &self.signers
    }

    pub fn is_signed(&self) -> bool {
        !self.signers.is_empty()
    }

    /// Whether every fingerprint in `required` signed this source.
    pub fn signed_by_all<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> bool {
        required.into_iter().all(|fp| {
            let fp = fp.to_ascii_lowercase();
            self.signers.iter().any(|s| s.fingerprint == fp)
        })
    }
}

impl fmt::Display for CodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.location)?;
        if self.signers.is_empty() {
            write!(f, " <no signer certificates>")?;
        } else {
            for signer in &self.signers {
                write!(f, " {}", signer)?;
            }
        }
        write!(f, ")")
    }
}
