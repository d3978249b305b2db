// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory container engine double shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use openclaw_orchestrator::domain::plugin::HealthState;
use openclaw_orchestrator::domain::runtime::{
    ContainerRuntime, ContainerSpec, ContainerState, ExecOutput, RuntimeError, StatsSample,
};

#[derive(Clone)]
pub struct FakeContainer {
    pub id: String,
    pub spec: ContainerSpec,
    pub running: bool,
}

#[derive(Default)]
pub struct FakeRuntime {
    pub containers: Mutex<HashMap<String, FakeContainer>>,
    /// Container name prefixes whose creation fails.
    pub fail_name_prefixes: Mutex<Vec<String>>,
    /// Images whose pulls fail.
    pub fail_pulls: Mutex<HashSet<String>>,
    /// When set, every call answers as if the engine socket were down.
    pub unavailable: AtomicBool,
    /// Optional rendezvous every pull waits on, to overlap installs.
    pub pull_barrier: Mutex<Option<Arc<tokio::sync::Barrier>>>,
    /// Combined output returned by `exec`.
    pub exec_output: Mutex<String>,
    pub stats: Mutex<StatsSample>,
    pub pulled: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl FakeRuntime {
    pub fn new() -> Self {
        let fake = Self::default();
        *fake.exec_output.lock().unwrap() = "Success".to_string();
        fake
    }

    fn check_available(&self) -> Result<(), RuntimeError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(RuntimeError::Unavailable("engine down".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn container(&self, name: &str) -> Option<FakeContainer> {
        self.containers.lock().unwrap().get(name).cloned()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> Result<String, RuntimeError> {
        self.check_available()?;
        Ok("27.0-fake".to_string())
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        self.check_available()?;
        if self.fail_pulls.lock().unwrap().contains(image) {
            return Err(RuntimeError::PullFailed(image.to_string()));
        }
        let barrier = self.pull_barrier.lock().unwrap().clone();
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        self.pulled.lock().unwrap().push(image.to_string());
        Ok(())
    }

    async fn create_container(&self, spec: ContainerSpec) -> Result<String, RuntimeError> {
        self.check_available()?;
        let prefixes = self.fail_name_prefixes.lock().unwrap().clone();
        if prefixes.iter().any(|p| spec.name.starts_with(p.as_str())) {
            return Err(RuntimeError::OperationFailed(format!(
                "create refused for {}",
                spec.name
            )));
        }
        let id = format!("ctr-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut containers = self.containers.lock().unwrap();
        containers.insert(
            spec.name.clone(),
            FakeContainer {
                id: id.clone(),
                spec,
                running: false,
            },
        );
        Ok(id)
    }

    async fn start_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.check_available()?;
        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .get_mut(name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        container.running = true;
        Ok(())
    }

    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.check_available()?;
        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .get_mut(name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        container.running = false;
        Ok(())
    }

    async fn restart_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.check_available()?;
        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .get_mut(name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        container.running = true;
        Ok(())
    }

    async fn remove_container(&self, name: &str, _force: bool) -> Result<(), RuntimeError> {
        self.check_available()?;
        let mut containers = self.containers.lock().unwrap();
        containers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))
    }

    async fn inspect_container(&self, name: &str) -> Result<ContainerState, RuntimeError> {
        self.check_available()?;
        let containers = self.containers.lock().unwrap();
        let container = containers
            .get(name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        let ports = container
            .spec
            .ports
            .iter()
            .map(|m| (format!("{}/tcp", m.container_port), m.host_port))
            .collect();
        Ok(ContainerState {
            id: container.id.clone(),
            running: container.running,
            status: if container.running {
                "running".to_string()
            } else {
                "exited".to_string()
            },
            started_at: None,
            finished_at: None,
            health: container
                .spec
                .health
                .as_ref()
                .map(|_| HealthState::Healthy),
            ports,
        })
    }

    async fn wait_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.check_available()?;
        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .get_mut(name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        container.running = false;
        let auto_remove = container.spec.auto_remove;
        if auto_remove {
            containers.remove(name);
        }
        Ok(())
    }

    async fn container_logs(&self, name: &str, _tail: usize) -> Result<String, RuntimeError> {
        self.check_available()?;
        let containers = self.containers.lock().unwrap();
        containers
            .get(name)
            .map(|_| format!("2026-08-23T00:00:00Z {name} ready\n"))
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))
    }

    async fn container_stats(&self, name: &str) -> Result<StatsSample, RuntimeError> {
        self.check_available()?;
        let containers = self.containers.lock().unwrap();
        if !containers.contains_key(name) {
            return Err(RuntimeError::NotFound(name.to_string()));
        }
        Ok(*self.stats.lock().unwrap())
    }

    async fn exec(&self, name: &str, _cmd: Vec<String>) -> Result<ExecOutput, RuntimeError> {
        self.check_available()?;
        let containers = self.containers.lock().unwrap();
        if !containers.contains_key(name) {
            return Err(RuntimeError::NotFound(name.to_string()));
        }
        Ok(ExecOutput {
            output: self.exec_output.lock().unwrap().clone(),
        })
    }

    async fn published_ports(&self) -> Result<HashSet<u16>, RuntimeError> {
        self.check_available()?;
        let containers = self.containers.lock().unwrap();
        Ok(containers
            .values()
            .flat_map(|c| c.spec.ports.iter().map(|m| m.host_port))
            .collect())
    }
}
