// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application layer: the loader gate and the protection-domain cache it owns.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Orchestrates readiness, origin resolution and materialization

pub mod domain_cache;
pub mod loader_gate;

pub use domain_cache::ProtectionDomainCache;
pub use loader_gate::{ByteRange, GateBuilder, LoadRequest, LoaderGate};
