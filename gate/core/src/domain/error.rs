// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Gate Errors
//!
//! Every failure of a load surfaces synchronously as a [`GateError`]. Nothing
//! is retried inside the gate.
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | `UninitializedUse` | the gate never became ready; the instance is unusable |
//! | `Authorization` | loader creation was rejected at initialization |
//! | `Format` | the module bytes are malformed |
//! | `Range` | the requested byte range lies outside the buffer |
//! | `PolicyViolation` | reserved namespace or signer/definition conflict |
//! | `Capability` | the capability policy failed, reported unchanged |
//! | `Internal` | an unexpected policy failure, wrapped with its cause |

use thiserror::Error;

use super::module_format::FormatError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("creation of a new loader is not permitted: {0}")]
    Denied(String),
}

/// Security-relevant conflicts detected while defining a unit. Retrying with
/// the same input cannot succeed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("unit name '{name}' is not a dot-separated sequence of identifiers")]
    InvalidName { name: String },

    #[error("unit '{name}' is in reserved namespace '{prefix}'")]
    ReservedNamespace { name: String, prefix: String },

    #[error("signers of unit '{name}' differ from the signers of other units in package '{package}'")]
    SignerMismatch { name: String, package: String },

    #[error("unit '{name}' is already defined under a different protection domain")]
    ConflictingDefinition { name: String },
}

/// Failure reported by a capability policy.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("capability policy rejected {location}: {reason}")]
    Rejected { location: String, reason: String },

    #[error("capability policy unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure reported by a materializer.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Violation(#[from] PolicyViolation),
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("loader gate not initialized")]
    UninitializedUse,

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error("malformed module: {0}")]
    Format(#[from] FormatError),

    #[error("byte range out of bounds: offset {offset} + length {length} exceeds {available} bytes")]
    Range {
        offset: usize,
        length: usize,
        available: usize,
    },

    #[error("policy violation: {0}")]
    PolicyViolation(#[from] PolicyViolation),

    #[error(transparent)]
    Capability(CapabilityError),

    #[error("internal error while {context}: {source}")]
    Internal {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<MaterializeError> for GateError {
    fn from(err: MaterializeError) -> Self {
        match err {
            MaterializeError::Format(e) => GateError::Format(e),
            MaterializeError::Violation(v) => GateError::PolicyViolation(v),
        }
    }
}

impl From<CapabilityError> for GateError {
    fn from(err: CapabilityError) -> Self {
        match err {
            CapabilityError::Other(source) => GateError::Internal {
                context: "resolving capabilities".to_string(),
                source,
            },
            known => GateError::Capability(known),
        }
    }
}
