// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Static Capability Policy
//!
//! Capability policy backed by the `spec.grants` list of the gate manifest.
//!
//! A grant matches a code source when its location matches and every
//! required signer fingerprint signed the source. The result for a source is
//! the union of the capabilities of all matching grants; a source matching
//! no grant receives the empty set.
//!
//! ## Location patterns
//!
//! - `https://host/lib/a.wasm` matches that URL exactly
//! - `https://host/lib/*` matches every location starting with `https://host/lib/`

use anyhow::Context;
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::debug;
use url::Url;

use crate::domain::capability::{Capability, CapabilitySet};
use crate::domain::code_source::CodeSource;
use crate::domain::config::GrantConfig;
use crate::domain::error::CapabilityError;
use crate::domain::policy::CapabilityPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
enum LocationPattern {
    Exact(Url),
    Prefix(String),
}

impl LocationPattern {
    fn parse(pattern: &str) -> anyhow::Result<Self> {
        match pattern.strip_suffix('*') {
            Some(prefix) => {
                let url = Url::parse(prefix)
                    .with_context(|| format!("Invalid grant location prefix '{}'", pattern))?;
                Ok(Self::Prefix(canonical_prefix(prefix, &url)))
            }
            None => Url::parse(pattern)
                .map(Self::Exact)
                .with_context(|| format!("Invalid grant location '{}'", pattern)),
        }
    }

    fn matches(&self, location: &Url) -> bool {
        match self {
            Self::Exact(url) => url == location,
            Self::Prefix(prefix) => location.as_str().starts_with(prefix.as_str()),
        }
    }
}

/// Prefix in the same serialized form as parsed source locations. The
/// parser appends `/` to a bare authority; that slash is dropped again so
/// `https://host*` still covers `https://host:8443/...`.
fn canonical_prefix(raw: &str, url: &Url) -> String {
    let serialized = url.as_str();
    if !raw.ends_with('/') && url.path() == "/" && url.query().is_none() {
        if let Some(trimmed) = serialized.strip_suffix('/') {
            return trimmed.to_string();
        }
    }
    serialized.to_string()
}

#[derive(Debug, Clone)]
struct Grant {
    location: LocationPattern,
    signers: Vec<String>,
    capabilities: Vec<Capability>,
}

#[derive(Debug, Clone, Default)]
pub struct StaticCapabilityPolicy {
    grants: Vec<Grant>,
}

impl StaticCapabilityPolicy {
    pub fn from_config(grants: &[GrantConfig]) -> anyhow::Result<Self> {
        let grants = grants
            .iter()
            .map(|grant| {
                let capabilities = grant
                    .capabilities
                    .iter()
                    .map(|c| {
                        c.parse::<Capability>()
                            .with_context(|| format!("Grant for '{}'", grant.location))
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?;
                Ok(Grant {
                    location: LocationPattern::parse(&grant.location)?,
                    signers: grant.signers.clone(),
                    capabilities,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { grants })
    }

    pub fn grant_count(&self) -> usize {
        self.grants.len()
    }

    /// Union of every matching grant.
    pub fn evaluate(&self, source: &CodeSource) -> CapabilitySet {
        let granted: BTreeSet<Capability> = self
            .grants
            .iter()
            .filter(|g| g.location.matches(source.location()))
            .filter(|g| source.signed_by_all(g.signers.iter().map(String::as_str)))
            .flat_map(|g| g.capabilities.iter().cloned())
            .collect();
        granted.into_iter().collect()
    }
}

#[async_trait]
impl CapabilityPolicy for StaticCapabilityPolicy {
    async fn capabilities_for(&self, source: &CodeSource) -> Result<CapabilitySet, CapabilityError> {
        let capabilities = self.evaluate(source);
        debug!(location = %source.location(), capabilities = %capabilities, "Evaluated static grants");
        Ok(capabilities)
    }
}
