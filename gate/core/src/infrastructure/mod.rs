// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure layer: default implementations of the gate's collaborators.

pub mod authorizer;
pub mod event_bus;
pub mod materializer;
pub mod static_policy;

pub use authorizer::ConfigAuthorizer;
pub use event_bus::{EventBus, EventBusError, EventReceiver};
pub use materializer::ModuleMaterializer;
pub use static_policy::StaticCapabilityPolicy;
