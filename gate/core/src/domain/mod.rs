// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: value objects, collaborator contracts, events and errors.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types shared by the gate and its collaborators

pub mod capability;
pub mod code_source;
pub mod config;
pub mod error;
pub mod events;
pub mod loaded_unit;
pub mod materializer;
pub mod module_format;
pub mod policy;
pub mod protection_domain;
