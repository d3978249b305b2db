// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Instance Service
//!
//! Coordinates the record store and the container lifecycle for agent
//! instances. The store's status field is authoritative; every lifecycle
//! operation updates it after the container action. No transaction spans
//! both systems, so a crash between them can leave the row one step behind
//! the container; the recreate-on-start semantics make that self-healing.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::instance_lifecycle::InstanceManager;
use crate::application::ports::next_instance_port;
use crate::domain::instance::{Instance, InstanceConfig, InstanceId, InstanceStatus};
use crate::domain::repository::{InstanceRepository, NewInstance};
use crate::domain::runtime::{ContainerState, ResourceUsage, RuntimeError};

/// Partial update applied to a stored instance. Absent fields keep their
/// stored value.
#[derive(Debug, Clone, Default)]
pub struct InstanceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<InstanceStatus>,
    pub config: Option<InstanceConfig>,
}

pub struct InstanceService {
    repo: Arc<dyn InstanceRepository>,
    manager: InstanceManager,
}

impl InstanceService {
    pub fn new(repo: Arc<dyn InstanceRepository>, manager: InstanceManager) -> Self {
        Self { repo, manager }
    }

    /// Create an instance: allocate the next port, persist the row, then
    /// provision the container. Any port carried in the supplied config is
    /// ignored; the allocator decides. On container failure the row is kept
    /// with status `error` and the failure propagates.
    pub async fn create(
        &self,
        user_id: i64,
        name: String,
        description: Option<String>,
        mut config: InstanceConfig,
    ) -> Result<Instance> {
        let existing: Vec<u16> = self
            .repo
            .list_all()
            .await
            .context("listing instances for port allocation")?
            .iter()
            .map(|i| i.port)
            .collect();
        let port = next_instance_port(&existing);
        config.port = port;

        let mut instance = self
            .repo
            .create(NewInstance {
                user_id,
                name,
                description,
                status: InstanceStatus::Stopped,
                config: config.clone(),
                port,
            })
            .await
            .context("persisting instance")?;

        match self.manager.create(instance.id, &config).await {
            Ok(created) => {
                instance.status = InstanceStatus::Running;
                instance.touch();
                self.repo.save(&instance).await.context("saving instance status")?;
                info!(instance = %instance.id, port = created.port, "instance created");
                Ok(instance)
            }
            Err(err) => {
                instance.status = InstanceStatus::Error;
                instance.touch();
                if let Err(save_err) = self.repo.save(&instance).await {
                    warn!(instance = %instance.id, error = %save_err, "failed to record error status");
                }
                Err(err)
            }
        }
    }

    pub async fn get(&self, id: InstanceId) -> Result<Instance> {
        self.repo
            .find_by_id(id)
            .await
            .context("loading instance")?
            .ok_or_else(|| anyhow!("instance not found: {id}"))
    }

    pub async fn list(&self) -> Result<Vec<Instance>> {
        Ok(self.repo.list_all().await.context("listing instances")?)
    }

    /// Apply a partial update. A config update keeps the row's assigned
    /// port. If the instance is currently running, its container is
    /// recreated so the new configuration takes effect.
    pub async fn update(&self, id: InstanceId, update: InstanceUpdate) -> Result<Instance> {
        let mut instance = self.get(id).await?;
        let was_running = instance.status == InstanceStatus::Running;

        if let Some(name) = update.name {
            instance.name = name;
        }
        if let Some(description) = update.description {
            instance.description = Some(description);
        }
        if let Some(status) = update.status {
            instance.status = status;
        }
        if let Some(mut config) = update.config {
            config.port = instance.port;
            instance.config = config;
        }
        instance.touch();
        self.repo.save(&instance).await.context("saving instance")?;

        if was_running {
            if let Err(err) = self.manager.stop(id).await {
                warn!(instance = %id, error = %err, "stop before reconfigure failed");
            }
            self.manager.start(id, Some(&instance.config)).await?;
        }
        Ok(instance)
    }

    /// Start an instance by recreating its container from the stored config.
    pub async fn start(&self, id: InstanceId) -> Result<Instance> {
        let mut instance = self.get(id).await?;
        self.manager.start(id, Some(&instance.config)).await?;
        instance.status = InstanceStatus::Running;
        instance.touch();
        self.repo.save(&instance).await.context("saving instance status")?;
        Ok(instance)
    }

    pub async fn stop(&self, id: InstanceId) -> Result<Instance> {
        let mut instance = self.get(id).await?;
        self.manager.stop(id).await?;
        instance.status = InstanceStatus::Stopped;
        instance.touch();
        self.repo.save(&instance).await.context("saving instance status")?;
        Ok(instance)
    }

    pub async fn restart(&self, id: InstanceId) -> Result<()> {
        self.get(id).await?;
        self.manager.restart(id).await
    }

    /// Delete the instance. Container and directory teardown failures are
    /// logged and ignored so a half-provisioned instance can still be
    /// removed from the store.
    pub async fn delete(&self, id: InstanceId) -> Result<()> {
        self.get(id).await?;
        if let Err(err) = self.manager.delete(id).await {
            warn!(instance = %id, error = %err, "container teardown failed, deleting row anyway");
        }
        self.repo.delete(id).await.context("deleting instance row")?;
        Ok(())
    }

    pub async fn install_skill(&self, id: InstanceId, name: &str, content: &str) -> Result<()> {
        self.get(id).await?;
        self.manager.install_skill(id, name, content).await
    }

    pub async fn container_status(&self, id: InstanceId) -> Result<ContainerState, RuntimeError> {
        self.manager.status(id).await
    }

    pub async fn logs(&self, id: InstanceId, tail: usize) -> Result<String, RuntimeError> {
        self.manager.logs(id, tail).await
    }

    pub async fn stats(&self, id: InstanceId) -> Result<ResourceUsage, RuntimeError> {
        self.manager.stats(id).await
    }
}
