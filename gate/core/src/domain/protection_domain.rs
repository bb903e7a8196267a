// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Protection Domain
//!
//! Binds a [`CodeSource`] to the [`CapabilitySet`] its policy granted and to
//! the gate that computed it. A gate creates at most one domain per distinct
//! code source; units loaded from equal sources share the same `Arc`, so
//! identity comparisons (`Arc::ptr_eq`) are meaningful for later
//! authorization decisions.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::capability::{Capability, CapabilitySet};
use super::code_source::CodeSource;

/// Identity of a loader gate instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GateId(pub Uuid);

impl GateId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainId(pub Uuid);

impl DomainId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DomainId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named identity on whose behalf code in a domain runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub kind: String,
    pub name: String,
}

/// Immutable (origin, capabilities, owning gate, principals) binding.
///
/// The owning gate is recorded by id rather than by reference; the gate owns
/// its cache and the cache owns the domains.
#[derive(Debug, Serialize)]
pub struct ProtectionDomain {
    id: DomainId,
    code_source: CodeSource,
    capabilities: CapabilitySet,
    loader: GateId,
    principals: Vec<Principal>,
}

impl ProtectionDomain {
    pub fn new(
        code_source: CodeSource,
        capabilities: CapabilitySet,
        loader: GateId,
        principals: Vec<Principal>,
    ) -> Self {
        Self {
            id: DomainId::new(),
            code_source,
            capabilities,
            loader,
            principals,
        }
    }

    pub fn id(&self) -> DomainId {
        self.id
    }

    pub fn code_source(&self) -> &CodeSource {
        &self.code_source
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn loader(&self) -> GateId {
        self.loader
    }

    pub fn principals(&self) -> &[Principal] {
        &self.principals
    }

    /// Whether code in this domain holds `capability`.
    pub fn implies(&self, capability: &Capability) -> bool {
        self.capabilities.implies(capability)
    }
}

impl fmt::Display for ProtectionDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProtectionDomain {} {} loader={} capabilities={}",
            self.id, self.code_source, self.loader, self.capabilities
        )?;
        if !self.principals.is_empty() {
            write!(f, " principals=[")?;
            for (i, p) in self.principals.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}:{}", p.kind, p.name)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
