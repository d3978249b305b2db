// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Plugin Service
//!
//! Record-store coordination for plugin installs. The row is only advanced
//! after the container operation succeeded; a failed install leaves the row
//! untouched so the dashboard keeps showing the previous state.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::warn;

use crate::application::plugin_lifecycle::{AdminActionOutcome, PluginManager};
use crate::domain::plugin::{ContainerStatus, PluginId, PluginInstall, PluginStatus};
use crate::domain::repository::{NewPluginInstall, PluginRepository};
use crate::domain::runtime::RuntimeError;

pub struct PluginService {
    repo: Arc<dyn PluginRepository>,
    manager: Arc<PluginManager>,
}

impl PluginService {
    pub fn new(repo: Arc<dyn PluginRepository>, manager: Arc<PluginManager>) -> Self {
        Self { repo, manager }
    }

    /// Create the store row for a plugin that has not been installed yet.
    pub async fn register(&self, definition_id: &str) -> Result<PluginInstall> {
        Ok(self
            .repo
            .create(NewPluginInstall {
                definition_id: definition_id.to_string(),
                config: serde_json::Map::new(),
            })
            .await
            .context("persisting plugin row")?)
    }

    pub async fn get(&self, id: PluginId) -> Result<PluginInstall> {
        self.repo
            .find_by_id(id)
            .await
            .context("loading plugin")?
            .ok_or_else(|| anyhow!("plugin not found: {id}"))
    }

    pub async fn list(&self) -> Result<Vec<PluginInstall>> {
        Ok(self.repo.list_all().await.context("listing plugins")?)
    }

    /// Install the plugin container and, on success, record port, container
    /// id and the supplied config on the row.
    pub async fn install(
        &self,
        id: PluginId,
        config: serde_json::Map<String, serde_json::Value>,
    ) -> Result<PluginInstall> {
        let mut plugin = self.get(id).await?;
        let installed = self
            .manager
            .install(id, &plugin.definition_id, &config)
            .await?;

        plugin.container_status = ContainerStatus::Running;
        plugin.host_port = Some(installed.host_port);
        plugin.container_id = Some(installed.container_id);
        plugin.config = config;
        plugin.touch();
        self.repo.save(&plugin).await.context("saving plugin row")?;
        Ok(plugin)
    }

    pub async fn start(&self, id: PluginId) -> Result<PluginInstall> {
        let mut plugin = self.get(id).await?;
        self.manager.start(id, &plugin.definition_id).await?;
        plugin.container_status = ContainerStatus::Running;
        plugin.touch();
        self.repo.save(&plugin).await.context("saving plugin row")?;
        Ok(plugin)
    }

    pub async fn stop(&self, id: PluginId) -> Result<PluginInstall> {
        let mut plugin = self.get(id).await?;
        self.manager.stop(id, &plugin.definition_id).await?;
        plugin.container_status = ContainerStatus::Stopped;
        plugin.touch();
        self.repo.save(&plugin).await.context("saving plugin row")?;
        Ok(plugin)
    }

    /// Uninstall the container and reset the row to `not_installed`. The row
    /// itself survives so the plugin can be reinstalled with its config.
    pub async fn uninstall(&self, id: PluginId, remove_data: bool) -> Result<PluginInstall> {
        let mut plugin = self.get(id).await?;
        self.manager
            .uninstall(id, &plugin.definition_id, remove_data)
            .await?;
        plugin.container_status = ContainerStatus::NotInstalled;
        plugin.host_port = None;
        plugin.container_id = None;
        plugin.touch();
        self.repo.save(&plugin).await.context("saving plugin row")?;
        Ok(plugin)
    }

    /// Live status from the engine. When the engine is unreachable the
    /// answer degrades to the row's last-known-good state, carrying the
    /// engine error so the dashboard can flag staleness.
    pub async fn status(&self, id: PluginId) -> Result<PluginStatus> {
        let plugin = self.get(id).await?;
        match self.manager.status(id, &plugin.definition_id).await {
            Ok(status) => Ok(status),
            Err(err @ RuntimeError::Unavailable(_)) => {
                warn!(plugin = %id, error = %err, "engine unreachable, answering from store");
                Ok(PluginStatus {
                    running: plugin.container_status == ContainerStatus::Running,
                    status: plugin.container_status,
                    container_id: plugin.container_id.clone(),
                    health: None,
                    ports: Default::default(),
                    error: Some(err.to_string()),
                })
            }
            Err(err) => Ok(PluginStatus::error(err.to_string())),
        }
    }

    pub async fn logs(&self, id: PluginId, tail: usize) -> Result<String> {
        let plugin = self.get(id).await?;
        Ok(self
            .manager
            .logs(id, &plugin.definition_id, tail)
            .await
            .context("fetching plugin logs")?)
    }

    pub async fn create_matrix_admin(
        &self,
        id: PluginId,
        username: &str,
        password: &str,
    ) -> Result<AdminActionOutcome> {
        let plugin = self.get(id).await?;
        if plugin.definition_id != "synapse" {
            return Err(anyhow!(
                "plugin {id} is '{}', not a Matrix homeserver",
                plugin.definition_id
            ));
        }
        self.manager.create_matrix_admin(id, username, password).await
    }
}
