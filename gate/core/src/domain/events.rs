// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Gate lifecycle events and the observer interface that receives them.
//!
//! Observers are injected per gate at construction, so two gates in one
//! process never share diagnostic configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::loaded_unit::UnitId;
use super::protection_domain::{DomainId, GateId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateEvent {
    GateInitialized {
        gate_id: GateId,
        initialized_at: DateTime<Utc>,
    },
    InitializationRejected {
        gate_id: GateId,
        reason: String,
        rejected_at: DateTime<Utc>,
    },
    DomainCreated {
        gate_id: GateId,
        domain_id: DomainId,
        location: String,
        signer_count: usize,
        capabilities: Vec<String>,
        created_at: DateTime<Utc>,
    },
    UnitDefined {
        gate_id: GateId,
        unit_id: UnitId,
        name: Option<String>,
        domain_id: Option<DomainId>,
        verified: bool,
        defined_at: DateTime<Utc>,
    },
    LoadRejected {
        gate_id: GateId,
        name: Option<String>,
        reason: String,
        rejected_at: DateTime<Utc>,
    },
}

impl GateEvent {
    pub fn gate_id(&self) -> GateId {
        match self {
            GateEvent::GateInitialized { gate_id, .. }
            | GateEvent::InitializationRejected { gate_id, .. }
            | GateEvent::DomainCreated { gate_id, .. }
            | GateEvent::UnitDefined { gate_id, .. }
            | GateEvent::LoadRejected { gate_id, .. } => *gate_id,
        }
    }
}

pub trait GateObserver: Send + Sync {
    fn on_event(&self, event: &GateEvent);
}
