// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Container Runtime boundary
//!
//! Thin capability surface over the local container engine. The orchestration
//! layer never talks to the engine socket directly; it goes through
//! [`ContainerRuntime`] so the client is an explicitly constructed, injected
//! dependency with test doubles instead of a module-level global.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::domain::plugin::HealthState;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The engine answered 404 for the addressed container. Read paths map
    /// this to `not_installed` rather than treating it as a failure.
    #[error("container not found: {0}")]
    NotFound(String),
    /// The engine socket is unreachable. Read paths degrade to the record
    /// store's last-known-good state.
    #[error("container engine unavailable: {0}")]
    Unavailable(String),
    #[error("image pull failed: {0}")]
    PullFailed(String),
    #[error("exec failed: {0}")]
    ExecFailed(String),
    #[error("container operation failed: {0}")]
    OperationFailed(String),
}

/// Host-to-container port publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
}

/// Bind mount between a host path and a container path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindMount {
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

impl BindMount {
    pub fn read_write(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only: false,
        }
    }

    pub fn read_only(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicyKind {
    No,
    UnlessStopped,
}

/// Engine health-check command descriptor. Durations are in seconds; the
/// adapter converts to whatever unit the engine expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthProbeSpec {
    pub test: Vec<String>,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub retries: u32,
    pub start_period_secs: u64,
}

/// Everything needed to materialize one container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    /// `KEY=value` entries.
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub binds: Vec<BindMount>,
    pub restart: RestartPolicyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthProbeSpec>,
    #[serde(default)]
    pub auto_remove: bool,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            cmd: None,
            env: Vec::new(),
            ports: Vec::new(),
            binds: Vec::new(),
            restart: RestartPolicyKind::No,
            health: None,
            auto_remove: false,
        }
    }
}

/// Inspect result, reduced to what the orchestration layer consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerState {
    pub id: String,
    pub running: bool,
    /// Engine status string ("running", "exited", ...).
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthState>,
    /// Container port spec ("8008/tcp") to bound host port.
    #[serde(default)]
    pub ports: HashMap<String, u16>,
}

/// Raw counters from a single stats sample. Percentages are derived in
/// [`ResourceUsage::from_sample`]; no averaging across samples.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StatsSample {
    pub cpu_total_usage: u64,
    pub precpu_total_usage: u64,
    pub system_cpu_usage: u64,
    pub presystem_cpu_usage: u64,
    pub online_cpus: u64,
    pub memory_usage: u64,
    pub memory_limit: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub memory_percent: f64,
}

impl ResourceUsage {
    /// `cpu% = (Δcontainer / Δsystem) × online_cpus × 100`,
    /// `mem% = usage / limit × 100`. Zero denominators yield 0.0.
    pub fn from_sample(sample: StatsSample) -> Self {
        let cpu_delta = sample.cpu_total_usage.saturating_sub(sample.precpu_total_usage) as f64;
        let system_delta = sample
            .system_cpu_usage
            .saturating_sub(sample.presystem_cpu_usage) as f64;
        let cpu_percent = if system_delta > 0.0 {
            (cpu_delta / system_delta) * sample.online_cpus as f64 * 100.0
        } else {
            0.0
        };
        let memory_percent = if sample.memory_limit > 0 {
            sample.memory_usage as f64 / sample.memory_limit as f64 * 100.0
        } else {
            0.0
        };
        Self {
            cpu_percent,
            memory_usage: sample.memory_usage,
            memory_limit: sample.memory_limit,
            memory_percent,
        }
    }
}

/// Captured output of an interactive exec session (stdout and stderr merged).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOutput {
    pub output: String,
}

/// Capability surface of the local container engine.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Engine reachability probe; returns the engine version string.
    async fn ping(&self) -> Result<String, RuntimeError>;

    /// Pull an image, following progress to completion before returning.
    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError>;

    /// Create a container; returns the engine-assigned container id.
    async fn create_container(&self, spec: ContainerSpec) -> Result<String, RuntimeError>;

    async fn start_container(&self, name: &str) -> Result<(), RuntimeError>;

    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError>;

    async fn restart_container(&self, name: &str) -> Result<(), RuntimeError>;

    async fn remove_container(&self, name: &str, force: bool) -> Result<(), RuntimeError>;

    async fn inspect_container(&self, name: &str) -> Result<ContainerState, RuntimeError>;

    /// Block until the container exits.
    async fn wait_container(&self, name: &str) -> Result<(), RuntimeError>;

    /// Last `tail` log lines, stdout and stderr, timestamped.
    async fn container_logs(&self, name: &str, tail: usize) -> Result<String, RuntimeError>;

    /// One point-in-time stats sample.
    async fn container_stats(&self, name: &str) -> Result<StatsSample, RuntimeError>;

    /// Run a command inside the container and capture its combined output.
    async fn exec(&self, name: &str, cmd: Vec<String>) -> Result<ExecOutput, RuntimeError>;

    /// Host ports published by any container on this host (running or not).
    async fn published_ports(&self) -> Result<HashSet<u16>, RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_percent_derives_from_deltas_and_core_count() {
        let usage = ResourceUsage::from_sample(StatsSample {
            cpu_total_usage: 400,
            precpu_total_usage: 200,
            system_cpu_usage: 2_000,
            presystem_cpu_usage: 1_000,
            online_cpus: 4,
            memory_usage: 256,
            memory_limit: 1024,
        });
        assert!((usage.cpu_percent - 80.0).abs() < f64::EPSILON);
        assert!((usage.memory_percent - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_denominators_do_not_produce_nan() {
        let usage = ResourceUsage::from_sample(StatsSample::default());
        assert_eq!(usage.cpu_percent, 0.0);
        assert_eq!(usage.memory_percent, 0.0);
    }
}
