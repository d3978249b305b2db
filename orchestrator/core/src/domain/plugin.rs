// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Store-assigned integer identifier for a plugin installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginId(pub i64);

impl PluginId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Container-level status of a plugin installation. `NotInstalled` is the
/// default state and the terminal state after uninstall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Running,
    Stopped,
    Error,
    NotInstalled,
}

/// Engine-reported health, present only when the container defines a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
    Starting,
}

/// Point-in-time status answer for a plugin, derived from the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginStatus {
    pub running: bool,
    pub status: ContainerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthState>,
    /// Container port spec ("8008/tcp") to bound host port.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub ports: HashMap<String, u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PluginStatus {
    pub fn not_installed() -> Self {
        Self {
            running: false,
            status: ContainerStatus::NotInstalled,
            container_id: None,
            health: None,
            ports: HashMap::new(),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            running: false,
            status: ContainerStatus::Error,
            container_id: None,
            health: None,
            ports: HashMap::new(),
            error: Some(message.into()),
        }
    }
}

/// Persisted plugin installation row, bound 1:1 to a registry definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInstall {
    pub id: PluginId,
    pub definition_id: String,
    pub container_status: ContainerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PluginInstall {
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Side-channel descriptor written to `<plugin>/config/plugin-info.json` at
/// install time, independent of whatever the record store holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub plugin_id: PluginId,
    pub definition_id: String,
    pub container_id: String,
    pub container_name: String,
    pub host_port: u16,
    pub config: serde_json::Map<String, serde_json::Value>,
    pub data_path: PathBuf,
    pub created_at: DateTime<Utc>,
}
