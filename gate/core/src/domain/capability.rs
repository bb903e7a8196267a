// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Capability Value Objects
//!
//! A [`Capability`] is a single `action:target` grant such as `read:/tmp`.
//! A [`CapabilitySet`] is the immutable collection a policy hands back for an
//! origin; it is what a protection domain carries for its whole lifetime.
//!
//! ## Target Matching
//!
//! [`Capability::implies`] supports:
//! - `"*"`: any target for the same action
//! - `"/tmp/*"`: any target under the `/tmp/` prefix, and `/tmp` itself
//! - `"/tmp"`: exact match only

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapabilityParseError {
    #[error("Invalid capability '{0}': expected 'action:target'")]
    MissingSeparator(String),

    #[error("Invalid capability '{0}': action and target must be non-empty")]
    EmptyPart(String),
}

/// A single granted permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Capability {
    action: String,
    target: String,
}

impl Capability {
    pub fn new(action: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            target: target.into(),
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether holding `self` grants `requested`.
    pub fn implies(&self, requested: &Capability) -> bool {
        if self.action != requested.action {
            return false;
        }
        if self.target == "*" || self.target == requested.target {
            return true;
        }
        if let Some(prefix) = self.target.strip_suffix("/*") {
            return requested.target == prefix
                || requested
                    .target
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'));
        }
        false
    }
}

impl FromStr for Capability {
    type Err = CapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (action, target) = s
            .split_once(':')
            .ok_or_else(|| CapabilityParseError::MissingSeparator(s.to_string()))?;
        let (action, target) = (action.trim(), target.trim());
        if action.is_empty() || target.is_empty() {
            return Err(CapabilityParseError::EmptyPart(s.to_string()));
        }
        Ok(Self::new(action, target))
    }
}

impl TryFrom<String> for Capability {
    type Error = CapabilityParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Capability> for String {
    fn from(value: Capability) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action, self.target)
    }
}

/// Immutable set of capabilities granted to an origin.
///
/// Shared rather than copied: cloning a set clones an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    grants: Arc<BTreeSet<Capability>>,
}

impl CapabilitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn contains(&self, capability: &Capability) -> bool {
        self.grants.contains(capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.grants.iter()
    }

    /// Whether any grant in the set implies `requested`.
    pub fn implies(&self, requested: &Capability) -> bool {
        self.grants.iter().any(|grant| grant.implies(requested))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            grants: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, grant) in self.grants.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", grant)?;
        }
        write!(f, "}}")
    }
}
