// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # CodeGate Core
//!
//! Loads WebAssembly modules through a gate that binds each loaded unit to the
//! protection domain of its origin. Protection domains are computed once per
//! distinct [`CodeSource`](domain::code_source::CodeSource) and shared by every
//! unit loaded from that origin.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Exposes the domain, application and infrastructure layers

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::{GateBuilder, LoaderGate, LoadRequest, ProtectionDomainCache};
