// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the CodeGate CLI

pub mod config;
pub mod load;

pub use self::config::ConfigCommand;
pub use self::load::LoadArgs;
