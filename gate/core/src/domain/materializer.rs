// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Materialization contract: turning validated bytes into a [`LoadedUnit`].

use bytes::Bytes;
use std::sync::Arc;

use super::error::MaterializeError;
use super::loaded_unit::LoadedUnit;
use super::protection_domain::ProtectionDomain;

/// How much structural checking the materializer performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Walk every section.
    Full,
    /// Caller asserts the bytes were verified upstream; only the header is checked.
    Skip,
}

/// Everything a materializer needs to define one unit. `code` is already
/// narrowed to the requested byte range.
#[derive(Debug, Clone)]
pub struct DefineRequest {
    pub name: Option<String>,
    pub code: Bytes,
    pub domain: Option<Arc<ProtectionDomain>>,
    pub verification: Verification,
}

pub trait Materializer: Send + Sync {
    fn materialize(&self, request: DefineRequest) -> Result<LoadedUnit, MaterializeError>;
}
