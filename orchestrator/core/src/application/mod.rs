// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod gateway_config;
pub mod instance_lifecycle;
pub mod instance_service;
pub mod plugin_config;
pub mod plugin_lifecycle;
pub mod plugin_service;
pub mod ports;

use serde::{Deserialize, Serialize};

use crate::domain::runtime::ContainerRuntime;

/// Result of probing the container engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineAvailability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Check whether the container engine is reachable. Never errors; the answer
/// is meant to be rendered, not handled.
pub async fn engine_availability(runtime: &dyn ContainerRuntime) -> EngineAvailability {
    match runtime.ping().await {
        Ok(version) => EngineAvailability {
            available: true,
            version: Some(version),
            error: None,
        },
        Err(err) => EngineAvailability {
            available: false,
            version: None,
            error: Some(err.to_string()),
        },
    }
}
