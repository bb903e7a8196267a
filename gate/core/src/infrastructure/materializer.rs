// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Module Materializer
//!
//! Default [`Materializer`]: checks the unit name and module bytes, enforces
//! namespace and signer rules, and records each definition.
//!
//! ## Rules (first failure wins)
//!
//! 1. A name, if given, is dot-separated identifier segments
//! 2. A name must not start with a reserved namespace prefix
//! 3. Module bytes pass [`module_format::validate`] (or only the header check
//!    under [`Verification::Skip`])
//! 4. All units of one package (name up to the last `.`) carry the same signers
//! 5. A name already defined under one protection domain cannot be defined
//!    under another; redefinition under the same domain yields a new unit

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use crate::domain::code_source::Signer;
use crate::domain::error::{MaterializeError, PolicyViolation};
use crate::domain::loaded_unit::LoadedUnit;
use crate::domain::materializer::{DefineRequest, Materializer, Verification};
use crate::domain::module_format;
use crate::domain::protection_domain::DomainId;

#[derive(Default)]
struct Registry {
    /// Unit name -> domain it was first defined under
    definitions: HashMap<String, Option<DomainId>>,
    /// Package name -> signer set of its first unit
    package_signers: HashMap<String, BTreeSet<Signer>>,
}

pub struct ModuleMaterializer {
    reserved_namespaces: Vec<String>,
    registry: Mutex<Registry>,
}

impl ModuleMaterializer {
    pub fn new(reserved_namespaces: Vec<String>) -> Self {
        Self {
            reserved_namespaces,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Number of distinct unit names defined so far.
    pub fn definition_count(&self) -> usize {
        self.registry.lock().definitions.len()
    }

    fn check_name(&self, name: &str) -> Result<(), MaterializeError> {
        let well_formed = name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '$'))
        });
        if !well_formed {
            return Err(PolicyViolation::InvalidName {
                name: name.to_string(),
            }
            .into());
        }

        if let Some(prefix) = self
            .reserved_namespaces
            .iter()
            .find(|prefix| name.starts_with(prefix.as_str()))
        {
            warn!(unit = %name, prefix = %prefix, "Definition in reserved namespace refused");
            return Err(PolicyViolation::ReservedNamespace {
                name: name.to_string(),
                prefix: prefix.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn record(
        &self,
        name: &str,
        domain: Option<DomainId>,
        signers: &BTreeSet<Signer>,
    ) -> Result<(), PolicyViolation> {
        let package = name.rsplit_once('.').map(|(p, _)| p).unwrap_or("");
        let mut registry = self.registry.lock();

        if let Some(existing) = registry.package_signers.get(package) {
            if existing != signers {
                return Err(PolicyViolation::SignerMismatch {
                    name: name.to_string(),
                    package: package.to_string(),
                });
            }
        }

        if let Some(existing) = registry.definitions.get(name) {
            if *existing != domain {
                return Err(PolicyViolation::ConflictingDefinition {
                    name: name.to_string(),
                });
            }
        }

        registry
            .package_signers
            .entry(package.to_string())
            .or_insert_with(|| signers.clone());
        registry.definitions.entry(name.to_string()).or_insert(domain);
        Ok(())
    }
}

impl Default for ModuleMaterializer {
    fn default() -> Self {
        Self::new(vec!["core.".to_string()])
    }
}

impl Materializer for ModuleMaterializer {
    fn materialize(&self, request: DefineRequest) -> Result<LoadedUnit, MaterializeError> {
        if let Some(name) = &request.name {
            self.check_name(name)?;
        }

        let section_count = match request.verification {
            Verification::Full => Some(module_format::validate(&request.code)?.sections.len()),
            Verification::Skip => {
                module_format::check_header(&request.code)?;
                None
            }
        };

        if let Some(name) = &request.name {
            let empty = BTreeSet::new();
            let signers = request
                .domain
                .as_ref()
                .map(|d| d.code_source().signers())
                .unwrap_or(&empty);
            self.record(name, request.domain.as_ref().map(|d| d.id()), signers)?;
        }

        let digest = hex::encode(Sha256::digest(&request.code));
        Ok(LoadedUnit::new(
            request.name,
            digest,
            request.code,
            request.domain,
            section_count,
        ))
    }
}
