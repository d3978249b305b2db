// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Instance Container Lifecycle
//!
//! Creates, recreates and tears down the per-instance gateway containers,
//! one container and one host directory tree per instance. Containers are
//! immutable with respect to configuration: applying a new config means
//! removing the container and creating it again from the regenerated gateway
//! document.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::gateway_config::{
    write_gateway_config, CONTAINER_CONFIG_PATH, CONTAINER_WORKSPACE, GATEWAY_CONFIG_FILE,
    GATEWAY_INTERNAL_PORT,
};
use crate::domain::instance::{InstanceConfig, InstanceId};
use crate::domain::runtime::{
    BindMount, ContainerRuntime, ContainerSpec, ContainerState, HealthProbeSpec, PortMapping,
    RestartPolicyKind, ResourceUsage, RuntimeError,
};

/// Bootstrap command run as pid 1: initialize the workspace git repository on
/// first boot, then hand over to the gateway process.
const GATEWAY_BOOTSTRAP: &str = "cd /home/node/.openclaw/workspace && ([ ! -d .git ] && git init && git config user.name 'OpenClaw' && git config user.email 'openclaw@workspace.local' && echo '# OpenClaw Workspace' > README.md && git add README.md && git commit -m 'Initial commit' || echo 'Git already initialized') && cd /app && node dist/index.js gateway";

/// Host directory layout of one instance.
#[derive(Debug, Clone)]
pub struct InstancePaths {
    pub root: PathBuf,
    pub workspace: PathBuf,
    pub skills: PathBuf,
    pub config: PathBuf,
}

/// Outcome of a successful container creation.
#[derive(Debug, Clone)]
pub struct CreatedInstance {
    pub container_id: String,
    pub gateway_token: String,
    pub port: u16,
}

/// Drives gateway containers through the injected [`ContainerRuntime`].
pub struct InstanceManager {
    runtime: Arc<dyn ContainerRuntime>,
    base_dir: PathBuf,
    image: String,
}

fn container_name(id: InstanceId) -> String {
    format!("openclaw-{id}")
}

impl InstanceManager {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, base_dir: PathBuf, image: String) -> Self {
        Self {
            runtime,
            base_dir,
            image,
        }
    }

    pub fn paths(&self, id: InstanceId) -> InstancePaths {
        let root = self.base_dir.join(id.to_string());
        InstancePaths {
            workspace: root.join("workspace"),
            skills: root.join("workspace").join("skills"),
            config: root.join("config"),
            root,
        }
    }

    async fn create_directories(&self, id: InstanceId) -> Result<InstancePaths> {
        let paths = self.paths(id);
        for dir in [&paths.root, &paths.workspace, &paths.skills, &paths.config] {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(paths)
    }

    /// Create the directory tree, generate the gateway document and start a
    /// fresh container publishing the gateway on `config.port`.
    pub async fn create(&self, id: InstanceId, config: &InstanceConfig) -> Result<CreatedInstance> {
        let paths = self.create_directories(id).await?;
        let gateway_token = write_gateway_config(config, &paths.config).await?;

        let mut env = vec![
            "NODE_ENV=production".to_string(),
            format!("OPENCLAW_GATEWAY_TOKEN={gateway_token}"),
            format!("OPENCLAW_CONFIG_PATH={CONTAINER_CONFIG_PATH}"),
        ];
        if !config.api_key.is_empty() {
            // Coding tools inside the container read the raw key from env.
            let key = match config.provider.as_str() {
                "openai" => "OPENAI_API_KEY",
                "anthropic" => "ANTHROPIC_API_KEY",
                _ => "DEEPSEEK_API_KEY",
            };
            env.push(format!("{key}={}", config.api_key));
        }

        let mut spec = ContainerSpec::new(container_name(id), &self.image);
        spec.cmd = Some(vec![
            "/bin/bash".to_string(),
            "-c".to_string(),
            GATEWAY_BOOTSTRAP.to_string(),
        ]);
        spec.env = env;
        spec.ports = vec![PortMapping {
            container_port: GATEWAY_INTERNAL_PORT,
            host_port: config.port,
        }];
        spec.binds = vec![
            BindMount::read_only(
                paths.config.join(GATEWAY_CONFIG_FILE).display().to_string(),
                CONTAINER_CONFIG_PATH,
            ),
            BindMount::read_write(paths.workspace.display().to_string(), CONTAINER_WORKSPACE),
        ];
        spec.restart = RestartPolicyKind::UnlessStopped;
        spec.health = Some(HealthProbeSpec {
            test: vec![
                "CMD".to_string(),
                "node".to_string(),
                "dist/index.js".to_string(),
                "health".to_string(),
            ],
            interval_secs: 30,
            timeout_secs: 10,
            retries: 3,
            start_period_secs: 60,
        });

        let container_id = self
            .runtime
            .create_container(spec)
            .await
            .with_context(|| format!("creating container for instance {id}"))?;
        self.runtime
            .start_container(&container_name(id))
            .await
            .with_context(|| format!("starting container for instance {id}"))?;

        info!(instance = %id, port = config.port, "instance container started");
        Ok(CreatedInstance {
            container_id,
            gateway_token,
            port: config.port,
        })
    }

    /// Start an instance. With a config, the container is removed and created
    /// again so the new gateway document takes effect; removal failures of a
    /// container that may not exist are ignored. Without a config, the
    /// existing container is started as-is and its absence is an error.
    pub async fn start(&self, id: InstanceId, config: Option<&InstanceConfig>) -> Result<()> {
        let name = container_name(id);
        if let Some(config) = config {
            if let Err(err) = self.runtime.stop_container(&name).await {
                warn!(instance = %id, error = %err, "pre-recreate stop failed");
            }
            if let Err(err) = self.runtime.remove_container(&name, false).await {
                warn!(instance = %id, error = %err, "pre-recreate remove failed");
            }
            self.create(id, config).await?;
            return Ok(());
        }
        self.runtime
            .start_container(&name)
            .await
            .with_context(|| format!("starting instance {id}"))?;
        Ok(())
    }

    pub async fn stop(&self, id: InstanceId) -> Result<()> {
        self.runtime
            .stop_container(&container_name(id))
            .await
            .with_context(|| format!("stopping instance {id}"))?;
        Ok(())
    }

    pub async fn restart(&self, id: InstanceId) -> Result<()> {
        self.runtime
            .restart_container(&container_name(id))
            .await
            .with_context(|| format!("restarting instance {id}"))?;
        Ok(())
    }

    /// Remove the container and the instance's host directory. Stop failures
    /// are ignored; removal of a genuinely present container must succeed.
    pub async fn delete(&self, id: InstanceId) -> Result<()> {
        let name = container_name(id);
        if let Err(err) = self.runtime.stop_container(&name).await {
            warn!(instance = %id, error = %err, "stop before delete failed");
        }
        self.runtime
            .remove_container(&name, false)
            .await
            .with_context(|| format!("removing container for instance {id}"))?;

        let root = self.paths(id).root;
        match tokio::fs::remove_dir_all(&root).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("removing {}", root.display()));
            }
        }
        info!(instance = %id, "instance deleted");
        Ok(())
    }

    /// Write a skill file into the instance workspace and restart the
    /// container so the gateway picks it up. The restart is unconditional.
    pub async fn install_skill(&self, id: InstanceId, name: &str, content: &str) -> Result<()> {
        let skills = self.paths(id).skills;
        tokio::fs::create_dir_all(&skills)
            .await
            .with_context(|| format!("creating {}", skills.display()))?;
        let path = skills.join(format!("{name}.md"));
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("writing skill {}", path.display()))?;
        self.restart(id).await?;
        info!(instance = %id, skill = name, "skill installed");
        Ok(())
    }

    pub async fn status(&self, id: InstanceId) -> Result<ContainerState, RuntimeError> {
        self.runtime.inspect_container(&container_name(id)).await
    }

    pub async fn logs(&self, id: InstanceId, tail: usize) -> Result<String, RuntimeError> {
        self.runtime.container_logs(&container_name(id), tail).await
    }

    pub async fn stats(&self, id: InstanceId) -> Result<ResourceUsage, RuntimeError> {
        let sample = self.runtime.container_stats(&container_name(id)).await?;
        Ok(ResourceUsage::from_sample(sample))
    }
}
