// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Policy Collaborators
//!
//! Two decisions are delegated out of the gate:
//!
//! - [`CapabilityPolicy`] computes the capabilities granted to a code source.
//!   Its result is memoized per source for the life of the gate, so an
//!   implementation must return the same set for equal sources.
//! - [`CreationAuthorizer`] decides once, at initialization, whether a new
//!   loader may exist at all.

use async_trait::async_trait;

use super::capability::CapabilitySet;
use super::code_source::CodeSource;
use super::error::{AuthorizationError, CapabilityError};

#[async_trait]
pub trait CapabilityPolicy: Send + Sync {
    /// Capabilities for code from `source`. Grants nothing unless overridden.
    async fn capabilities_for(&self, source: &CodeSource) -> Result<CapabilitySet, CapabilityError> {
        let _ = source;
        Ok(CapabilitySet::empty())
    }
}

/// Grants nothing to anyone.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCapabilityPolicy;

impl CapabilityPolicy for DefaultCapabilityPolicy {}

pub trait CreationAuthorizer: Send + Sync {
    fn check_create_permitted(&self) -> Result<(), AuthorizationError>;
}

/// Permits every loader creation.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl CreationAuthorizer for AllowAll {
    fn check_create_permitted(&self) -> Result<(), AuthorizationError> {
        Ok(())
    }
}
