// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Plugin Container Manager
//!
//! Installs, starts, stops and uninstalls infrastructure plugin containers
//! from registry definitions. Install is idempotent per plugin id: an
//! existing container under the same name is force-removed and replaced.
//! Read paths answer from the engine and map its absence signals instead of
//! failing.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::plugin_config::{config_port, validate_required_fields, PluginPaths};
use crate::application::ports::PortAllocator;
use crate::domain::plugin::{ContainerStatus, PluginDescriptor, PluginId, PluginStatus};
use crate::domain::registry::{definition, PluginDefinition};
use crate::domain::runtime::{
    BindMount, ContainerRuntime, ContainerSpec, PortMapping, RestartPolicyKind, RuntimeError,
};

const DESCRIPTOR_FILE: &str = "plugin-info.json";

/// Outcome of a successful install.
#[derive(Debug, Clone)]
pub struct InstalledPlugin {
    pub host_port: u16,
    pub container_id: String,
}

/// Result of an administrative exec inside a plugin container. Success is
/// judged from the command's textual output, so the raw output is kept for
/// the caller.
#[derive(Debug, Clone)]
pub struct AdminActionOutcome {
    pub success: bool,
    pub output: String,
}

pub struct PluginManager {
    runtime: Arc<dyn ContainerRuntime>,
    base_dir: PathBuf,
    allocator: PortAllocator,
}

fn container_name(definition_id: &str, id: PluginId) -> String {
    format!("openclaw-plugin-{definition_id}-{id}")
}

impl PluginManager {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, base_dir: PathBuf) -> Self {
        let allocator = PortAllocator::new(Arc::clone(&runtime));
        Self {
            runtime,
            base_dir,
            allocator,
        }
    }

    pub fn paths(&self, id: PluginId) -> PluginPaths {
        let root = self.base_dir.join(id.to_string());
        PluginPaths {
            data: root.join("data"),
            config: root.join("config"),
            root,
        }
    }

    async fn create_directories(&self, id: PluginId) -> Result<PluginPaths> {
        let paths = self.paths(id);
        for dir in [&paths.root, &paths.data, &paths.config] {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(paths)
    }

    /// Install a plugin: pull the image, run the definition's install
    /// strategy, replace any same-named container and start the new one.
    /// The descriptor file is written only after the container is up.
    ///
    /// Host port for the definition's primary container port: an explicit
    /// port field from the config wins, otherwise the first free port at or
    /// above the definition's default. An allocated port stays reserved
    /// until the install finished, so overlapping installs cannot collide
    /// while neither container exists yet.
    pub async fn install(
        &self,
        id: PluginId,
        definition_id: &str,
        config: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<InstalledPlugin> {
        let definition =
            definition(definition_id).ok_or_else(|| anyhow!("unknown plugin definition: {definition_id}"))?;
        validate_required_fields(definition, config)?;

        let paths = self.create_directories(id).await?;

        let explicit_port = ["port", "httpPort", "apiPort"]
            .into_iter()
            .find_map(|field| config_port(config, field));
        let host_port = match explicit_port {
            Some(port) => port,
            None => self.allocator.next_free_port(definition.default_port).await?,
        };

        let result = self
            .provision(id, definition_id, definition, config, &paths, host_port)
            .await;
        if explicit_port.is_none() {
            self.allocator.release(host_port).await;
        }
        result
    }

    async fn provision(
        &self,
        id: PluginId,
        definition_id: &str,
        definition: &PluginDefinition,
        config: &serde_json::Map<String, serde_json::Value>,
        paths: &PluginPaths,
        host_port: u16,
    ) -> Result<InstalledPlugin> {
        let image = definition.image_ref();
        info!(plugin = %definition_id, %image, "pulling plugin image");
        self.runtime
            .pull_image(&image)
            .await
            .with_context(|| format!("pulling {image}"))?;

        let prepared = definition
            .strategy
            .prepare(definition, config, paths, self.runtime.as_ref())
            .await?;

        let name = container_name(definition_id, id);
        match self.runtime.remove_container(&name, true).await {
            Ok(()) => info!(container = %name, "replaced existing plugin container"),
            Err(RuntimeError::NotFound(_)) => {}
            Err(err) => return Err(err).context("removing previous plugin container"),
        }

        let mut ports = vec![PortMapping {
            container_port: definition.container_port,
            host_port,
        }];
        ports.extend(prepared.extra_ports);

        let mut spec = ContainerSpec::new(&name, &image);
        spec.cmd = prepared.cmd;
        spec.env = prepared.env;
        spec.ports = ports;
        spec.binds = vec![BindMount::read_write(
            paths.data.display().to_string(),
            &definition.data_volume,
        )];
        spec.restart = RestartPolicyKind::UnlessStopped;

        let container_id = self
            .runtime
            .create_container(spec)
            .await
            .with_context(|| format!("creating container {name}"))?;
        self.runtime
            .start_container(&name)
            .await
            .with_context(|| format!("starting container {name}"))?;

        let descriptor = PluginDescriptor {
            plugin_id: id,
            definition_id: definition_id.to_string(),
            container_id: container_id.clone(),
            container_name: name,
            host_port,
            config: config.clone(),
            data_path: paths.data.clone(),
            created_at: Utc::now(),
        };
        let rendered =
            serde_json::to_string_pretty(&descriptor).context("serializing plugin descriptor")?;
        tokio::fs::write(paths.config.join(DESCRIPTOR_FILE), rendered)
            .await
            .context("writing plugin descriptor")?;

        info!(plugin = %definition_id, port = host_port, "plugin installed");
        Ok(InstalledPlugin {
            host_port,
            container_id,
        })
    }

    /// Start the plugin container if it is not already running.
    pub async fn start(&self, id: PluginId, definition_id: &str) -> Result<()> {
        let name = container_name(definition_id, id);
        let state = self
            .runtime
            .inspect_container(&name)
            .await
            .with_context(|| format!("inspecting {name}"))?;
        if !state.running {
            self.runtime
                .start_container(&name)
                .await
                .with_context(|| format!("starting {name}"))?;
        }
        Ok(())
    }

    /// Stop the plugin container if it is running.
    pub async fn stop(&self, id: PluginId, definition_id: &str) -> Result<()> {
        let name = container_name(definition_id, id);
        let state = self
            .runtime
            .inspect_container(&name)
            .await
            .with_context(|| format!("inspecting {name}"))?;
        if state.running {
            self.runtime
                .stop_container(&name)
                .await
                .with_context(|| format!("stopping {name}"))?;
        }
        Ok(())
    }

    /// Remove the plugin container, and optionally its data directory.
    /// Idempotent: a missing container is not an error.
    pub async fn uninstall(&self, id: PluginId, definition_id: &str, remove_data: bool) -> Result<()> {
        let name = container_name(definition_id, id);
        match self.runtime.inspect_container(&name).await {
            Ok(state) => {
                if state.running {
                    if let Err(err) = self.runtime.stop_container(&name).await {
                        warn!(container = %name, error = %err, "stop before uninstall failed");
                    }
                }
                if let Err(err) = self.runtime.remove_container(&name, false).await {
                    warn!(container = %name, error = %err, "container removal failed");
                }
            }
            Err(RuntimeError::NotFound(_)) => {}
            Err(err) => {
                warn!(container = %name, error = %err, "inspect before uninstall failed");
            }
        }

        if remove_data {
            let root = self.paths(id).root;
            match tokio::fs::remove_dir_all(&root).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(err).with_context(|| format!("removing {}", root.display()));
                }
            }
        }
        info!(plugin = %definition_id, id = %id, "plugin uninstalled");
        Ok(())
    }

    /// Engine-derived status. A 404 from the engine means the plugin is not
    /// installed; an unreachable engine propagates so the caller can degrade
    /// to the record store. Every other failure becomes an error status.
    pub async fn status(&self, id: PluginId, definition_id: &str) -> Result<PluginStatus, RuntimeError> {
        let name = container_name(definition_id, id);
        match self.runtime.inspect_container(&name).await {
            Ok(state) => Ok(PluginStatus {
                running: state.running,
                status: if state.running {
                    ContainerStatus::Running
                } else {
                    ContainerStatus::Stopped
                },
                container_id: Some(state.id),
                health: state.health,
                ports: state.ports,
                error: None,
            }),
            Err(RuntimeError::NotFound(_)) => Ok(PluginStatus::not_installed()),
            Err(err @ RuntimeError::Unavailable(_)) => Err(err),
            Err(err) => Ok(PluginStatus::error(err.to_string())),
        }
    }

    pub async fn logs(&self, id: PluginId, definition_id: &str, tail: usize) -> Result<String, RuntimeError> {
        self.runtime
            .container_logs(&container_name(definition_id, id), tail)
            .await
    }

    /// Read the descriptor written at install time.
    pub async fn read_descriptor(&self, id: PluginId) -> Result<PluginDescriptor> {
        let path = self.paths(id).config.join(DESCRIPTOR_FILE);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(serde_json::from_str(&raw).context("parsing plugin descriptor")?)
    }

    /// Register an admin account on an installed Matrix homeserver by
    /// exec-ing the registration tool inside its container. The tool does
    /// not use exit codes reliably, so success is detected from its output.
    pub async fn create_matrix_admin(
        &self,
        id: PluginId,
        username: &str,
        password: &str,
    ) -> Result<AdminActionOutcome> {
        // Fails fast when the plugin was never installed on this host.
        self.read_descriptor(id)
            .await
            .context("plugin descriptor unavailable")?;

        let name = container_name("synapse", id);
        let exec = self
            .runtime
            .exec(
                &name,
                vec![
                    "register_new_matrix_user".to_string(),
                    "-c".to_string(),
                    "/data/homeserver.yaml".to_string(),
                    "-u".to_string(),
                    username.to_string(),
                    "-p".to_string(),
                    password.to_string(),
                    "-a".to_string(),
                    "http://localhost:8008".to_string(),
                ],
            )
            .await
            .context("executing user registration")?;

        let success = exec.output.contains("Success") || exec.output.contains("created");
        Ok(AdminActionOutcome {
            success,
            output: exec.output,
        })
    }

    /// Convenience wrappers for the Matrix homeserver plugin.
    pub async fn install_synapse(
        &self,
        id: PluginId,
        config: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<InstalledPlugin> {
        self.install(id, "synapse", config).await
    }

    pub async fn synapse_status(&self, id: PluginId) -> Result<PluginStatus, RuntimeError> {
        self.status(id, "synapse").await
    }

    pub async fn uninstall_synapse(&self, id: PluginId, remove_data: bool) -> Result<()> {
        self.uninstall(id, "synapse", remove_data).await
    }
}
