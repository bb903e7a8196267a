// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Loader Gate
//!
//! Turns module bytes plus an optional [`CodeSource`] into a [`LoadedUnit`]
//! bound to the protection domain of that source.
//!
//! ## Lifecycle
//!
//! A gate is `Pending` until [`LoaderGate::initialize`] runs the creation
//! authorization check, then `Ready` or `Rejected` for good. Every operation
//! other than `initialize` fails with [`GateError::UninitializedUse`] unless
//! the gate is `Ready`. [`GateBuilder::build`] performs both steps.
//!
//! ## Load Pipeline
//!
//! 1. Readiness check
//! 2. Byte-range check (before any cache access)
//! 3. Protection-domain resolution through the cache, if a source is given
//! 4. Materialization with the domain bound
//!
//! Equal code sources on one gate always yield the same `Arc<ProtectionDomain>`.

use bytes::Bytes;
use chrono::Utc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::domain_cache::ProtectionDomainCache;
use crate::domain::capability::CapabilitySet;
use crate::domain::code_source::CodeSource;
use crate::domain::config::GateConfig;
use crate::domain::error::GateError;
use crate::domain::events::{GateEvent, GateObserver};
use crate::domain::loaded_unit::LoadedUnit;
use crate::domain::materializer::{DefineRequest, Materializer, Verification};
use crate::domain::policy::{AllowAll, CapabilityPolicy, CreationAuthorizer, DefaultCapabilityPolicy};
use crate::domain::protection_domain::{GateId, ProtectionDomain};
use crate::infrastructure::authorizer::ConfigAuthorizer;
use crate::infrastructure::materializer::ModuleMaterializer;
use crate::infrastructure::static_policy::StaticCapabilityPolicy;

const PENDING: u8 = 0;
const READY: u8 = 1;
const REJECTED: u8 = 2;

/// Sub-range of the supplied buffer holding the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub name: Option<String>,
    pub bytes: Bytes,
    pub range: Option<ByteRange>,
    pub code_source: Option<CodeSource>,
}

impl LoadRequest {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            name: None,
            bytes: bytes.into(),
            range: None,
            code_source: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_range(mut self, offset: usize, length: usize) -> Self {
        self.range = Some(ByteRange { offset, length });
        self
    }

    pub fn from_source(mut self, code_source: CodeSource) -> Self {
        self.code_source = Some(code_source);
        self
    }
}

pub struct GateBuilder {
    policy: Arc<dyn CapabilityPolicy>,
    authorizer: Arc<dyn CreationAuthorizer>,
    materializer: Arc<dyn Materializer>,
    observer: Option<Arc<dyn GateObserver>>,
}

impl GateBuilder {
    /// Empty-grant policy, permissive authorizer, default materializer, no observer.
    pub fn new() -> Self {
        Self {
            policy: Arc::new(DefaultCapabilityPolicy),
            authorizer: Arc::new(AllowAll),
            materializer: Arc::new(ModuleMaterializer::default()),
            observer: None,
        }
    }

    /// Collaborators derived from a gate configuration manifest.
    pub fn from_config(config: &GateConfig) -> anyhow::Result<Self> {
        Ok(Self {
            policy: Arc::new(StaticCapabilityPolicy::from_config(&config.spec.grants)?),
            authorizer: Arc::new(ConfigAuthorizer::new(&config.spec.authorization)),
            materializer: Arc::new(ModuleMaterializer::new(
                config.spec.reserved_namespaces.clone(),
            )),
            observer: None,
        })
    }

    pub fn policy(mut self, policy: Arc<dyn CapabilityPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn authorizer(mut self, authorizer: Arc<dyn CreationAuthorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn materializer(mut self, materializer: Arc<dyn Materializer>) -> Self {
        self.materializer = materializer;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn GateObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build and initialize. Fails if loader creation is not permitted.
    pub fn build(self) -> Result<LoaderGate, GateError> {
        let gate = self.build_uninitialized();
        gate.initialize()?;
        Ok(gate)
    }

    /// Build without running the authorization check. The gate rejects all
    /// operations until [`LoaderGate::initialize`] succeeds.
    pub fn build_uninitialized(self) -> LoaderGate {
        LoaderGate {
            id: GateId::new(),
            state: AtomicU8::new(PENDING),
            policy: self.policy,
            authorizer: self.authorizer,
            materializer: self.materializer,
            observer: self.observer,
            cache: ProtectionDomainCache::new(),
        }
    }
}

impl Default for GateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct LoaderGate {
    id: GateId,
    state: AtomicU8,
    policy: Arc<dyn CapabilityPolicy>,
    authorizer: Arc<dyn CreationAuthorizer>,
    materializer: Arc<dyn Materializer>,
    observer: Option<Arc<dyn GateObserver>>,
    cache: ProtectionDomainCache,
}

impl LoaderGate {
    pub fn builder() -> GateBuilder {
        GateBuilder::new()
    }

    pub fn id(&self) -> GateId {
        self.id
    }

    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    /// Run the one-time creation check. Idempotent once ready; a rejected
    /// gate stays rejected.
    pub fn initialize(&self) -> Result<(), GateError> {
        match self.state.load(Ordering::Acquire) {
            READY => return Ok(()),
            REJECTED => return Err(GateError::UninitializedUse),
            _ => {}
        }

        match self.authorizer.check_create_permitted() {
            Ok(()) => match self
                .state
                .compare_exchange(PENDING, READY, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    info!(gate_id = %self.id, "Loader gate initialized");
                    self.emit(GateEvent::GateInitialized {
                        gate_id: self.id,
                        initialized_at: Utc::now(),
                    });
                    Ok(())
                }
                Err(READY) => Ok(()),
                Err(_) => Err(GateError::UninitializedUse),
            },
            Err(e) => {
                let _ = self.state.compare_exchange(
                    PENDING,
                    REJECTED,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                warn!(gate_id = %self.id, error = %e, "Loader gate creation rejected");
                self.emit(GateEvent::InitializationRejected {
                    gate_id: self.id,
                    reason: e.to_string(),
                    rejected_at: Utc::now(),
                });
                Err(GateError::Authorization(e))
            }
        }
    }

    /// Load a module with full structural verification.
    pub async fn load(&self, request: LoadRequest) -> Result<Arc<LoadedUnit>, GateError> {
        self.define(request, Verification::Full).await
    }

    /// Load a module whose bytes the caller has already verified. Origin
    /// resolution, binding and errors are identical to [`LoaderGate::load`].
    pub async fn load_preverified(
        &self,
        request: LoadRequest,
    ) -> Result<Arc<LoadedUnit>, GateError> {
        self.define(request, Verification::Skip).await
    }

    /// The protection domain for `source`, computing it on first use.
    pub async fn protection_domain(
        &self,
        source: &CodeSource,
    ) -> Result<Arc<ProtectionDomain>, GateError> {
        self.check()?;
        self.domain_for(source).await
    }

    /// Ask the capability policy what `source` is granted. Not memoized; the
    /// cache calls this once per distinct source.
    pub async fn resolve_capabilities(
        &self,
        source: &CodeSource,
    ) -> Result<CapabilitySet, GateError> {
        self.check()?;
        Ok(self.policy.capabilities_for(source).await?)
    }

    /// Number of protection domains computed so far.
    pub fn cached_domains(&self) -> usize {
        self.cache.len()
    }

    async fn define(
        &self,
        request: LoadRequest,
        verification: Verification,
    ) -> Result<Arc<LoadedUnit>, GateError> {
        let name = request.name.clone();
        let result = self.define_unit(request, verification).await;
        if let Err(ref e) = result {
            warn!(gate_id = %self.id, unit = ?name, error = %e, "Load rejected");
            self.emit(GateEvent::LoadRejected {
                gate_id: self.id,
                name,
                reason: e.to_string(),
                rejected_at: Utc::now(),
            });
        }
        result
    }

    async fn define_unit(
        &self,
        request: LoadRequest,
        verification: Verification,
    ) -> Result<Arc<LoadedUnit>, GateError> {
        self.check()?;
        let code = select_range(&request.bytes, request.range)?;

        let domain = match &request.code_source {
            Some(source) => Some(self.domain_for(source).await?),
            None => None,
        };

        let unit = self.materializer.materialize(DefineRequest {
            name: request.name,
            code,
            domain,
            verification,
        })?;

        metrics::counter!("codegate_units_defined_total").increment(1);
        debug!(
            gate_id = %self.id,
            unit = ?unit.name(),
            digest = %unit.digest(),
            verified = unit.is_verified(),
            "Unit defined"
        );
        self.emit(GateEvent::UnitDefined {
            gate_id: self.id,
            unit_id: unit.id(),
            name: unit.name().map(str::to_string),
            domain_id: unit.protection_domain().map(|d| d.id()),
            verified: unit.is_verified(),
            defined_at: unit.defined_at(),
        });

        Ok(Arc::new(unit))
    }

    async fn domain_for(&self, source: &CodeSource) -> Result<Arc<ProtectionDomain>, GateError> {
        self.cache
            .resolve(source, move || async move {
                let capabilities = self.resolve_capabilities(source).await?;
                let domain = ProtectionDomain::new(source.clone(), capabilities, self.id, vec![]);

                info!(
                    gate_id = %self.id,
                    domain_id = %domain.id(),
                    location = %source.location(),
                    capabilities = %domain.capabilities(),
                    "Protection domain created"
                );
                self.emit(GateEvent::DomainCreated {
                    gate_id: self.id,
                    domain_id: domain.id(),
                    location: source.location().to_string(),
                    signer_count: source.signers().len(),
                    capabilities: domain.capabilities().iter().map(|c| c.to_string()).collect(),
                    created_at: Utc::now(),
                });
                Ok(domain)
            })
            .await
    }

    fn check(&self) -> Result<(), GateError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(GateError::UninitializedUse)
        }
    }

    fn emit(&self, event: GateEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }
}

fn select_range(bytes: &Bytes, range: Option<ByteRange>) -> Result<Bytes, GateError> {
    let Some(ByteRange { offset, length }) = range else {
        return Ok(bytes.clone());
    };
    match offset.checked_add(length) {
        Some(end) if end <= bytes.len() => Ok(bytes.slice(offset..end)),
        _ => Err(GateError::Range {
            offset,
            length,
            available: bytes.len(),
        }),
    }
}
