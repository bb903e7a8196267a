// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Protection-Domain Cache
//!
//! Memoizes one [`ProtectionDomain`] per distinct [`CodeSource`] for the life
//! of the owning gate.
//!
//! ## Concurrency
//!
//! Each key maps to its own `OnceCell`. A miss inserts an empty cell into the
//! sharded map (holding the shard lock only for the insert), then awaits the
//! cell outside any map lock. Concurrent resolvers of the same key therefore
//! wait on a single computation, while resolvers of other keys never wait on
//! it. A failed or cancelled computation leaves the cell empty; the next
//! resolver computes again. Entries are never evicted.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::domain::code_source::CodeSource;
use crate::domain::error::GateError;
use crate::domain::protection_domain::ProtectionDomain;

type DomainCell = Arc<OnceCell<Arc<ProtectionDomain>>>;

#[derive(Default)]
pub struct ProtectionDomainCache {
    entries: DashMap<CodeSource, DomainCell>,
}

impl ProtectionDomainCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the domain cached for `source`, running `compute` if there is
    /// none yet. `compute` runs at most once per key unless it fails.
    pub async fn resolve<F, Fut>(
        &self,
        source: &CodeSource,
        compute: F,
    ) -> Result<Arc<ProtectionDomain>, GateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ProtectionDomain, GateError>>,
    {
        if let Some(domain) = self.get(source) {
            metrics::counter!("codegate_domain_cache_hits_total").increment(1);
            debug!(location = %source.location(), "Protection domain cache hit");
            return Ok(domain);
        }

        let cell = self.cell_for(source);
        let mut computed = false;
        let domain = cell
            .get_or_try_init(|| {
                computed = true;
                async move { compute().await.map(Arc::new) }
            })
            .await?;

        if computed {
            metrics::counter!("codegate_domain_cache_misses_total").increment(1);
        } else {
            metrics::counter!("codegate_domain_cache_hits_total").increment(1);
        }
        Ok(Arc::clone(domain))
    }

    /// The cached domain for `source`, if one has been computed.
    pub fn get(&self, source: &CodeSource) -> Option<Arc<ProtectionDomain>> {
        self.entries
            .get(source)
            .and_then(|cell| cell.get().cloned())
    }

    /// Number of computed domains.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // The shard guard returned by `entry` is dropped at the end of this
    // statement, before any await.
    fn cell_for(&self, source: &CodeSource) -> DomainCell {
        self.entries
            .entry(source.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone()
    }
}
