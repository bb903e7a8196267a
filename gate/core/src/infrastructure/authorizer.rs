// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::config::AuthorizationConfig;
use crate::domain::error::AuthorizationError;
use crate::domain::policy::CreationAuthorizer;

/// Creation authorizer driven by `spec.authorization` of the gate manifest.
#[derive(Debug, Clone, Copy)]
pub struct ConfigAuthorizer {
    allow_create: bool,
}

impl ConfigAuthorizer {
    pub fn new(config: &AuthorizationConfig) -> Self {
        Self {
            allow_create: config.allow_create,
        }
    }
}

impl CreationAuthorizer for ConfigAuthorizer {
    fn check_create_permitted(&self) -> Result<(), AuthorizationError> {
        if self.allow_create {
            Ok(())
        } else {
            Err(AuthorizationError::Denied(
                "loader creation is disabled by spec.authorization.allow_create".to_string(),
            ))
        }
    }
}
