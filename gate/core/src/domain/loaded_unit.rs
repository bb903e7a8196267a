// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Loaded unit: the materialized result of a single load call.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::protection_domain::ProtectionDomain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(pub Uuid);

impl UnitId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A defined module. The protection-domain binding is fixed at construction
/// and there is no way to change it afterwards.
#[derive(Debug, Serialize)]
pub struct LoadedUnit {
    id: UnitId,
    name: Option<String>,
    /// Lowercase hex SHA-256 of `code`.
    digest: String,
    #[serde(skip)]
    code: Bytes,
    #[serde(skip)]
    domain: Option<Arc<ProtectionDomain>>,
    /// Whether the full section walk ran for this unit.
    verified: bool,
    section_count: Option<usize>,
    defined_at: DateTime<Utc>,
}

impl LoadedUnit {
    pub fn new(
        name: Option<String>,
        digest: String,
        code: Bytes,
        domain: Option<Arc<ProtectionDomain>>,
        section_count: Option<usize>,
    ) -> Self {
        Self {
            id: UnitId::new(),
            name,
            digest,
            code,
            domain,
            verified: section_count.is_some(),
            section_count,
            defined_at: Utc::now(),
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn code(&self) -> &Bytes {
        &self.code
    }

    pub fn protection_domain(&self) -> Option<&Arc<ProtectionDomain>> {
        self.domain.as_ref()
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn section_count(&self) -> Option<usize> {
        self.section_count
    }

    pub fn defined_at(&self) -> DateTime<Utc> {
        self.defined_at
    }
}
