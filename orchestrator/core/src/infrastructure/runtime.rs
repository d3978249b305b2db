// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Docker adapter for [`ContainerRuntime`].

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogOutput,
    LogsOptions, RemoveContainerOptions, RestartContainerOptions, StartContainerOptions,
    StatsOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{
    HealthConfig, HealthStatusEnum, HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum,
};
use bollard::Docker;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::domain::plugin::HealthState;
use crate::domain::runtime::{
    ContainerRuntime, ContainerSpec, ContainerState, ExecOutput, RestartPolicyKind, RuntimeError,
    StatsSample,
};

pub struct DockerRuntime {
    docker: Docker,
}

/// Engine error taxonomy: 404 means the addressed container does not exist,
/// a transport-level failure means the daemon is unreachable.
fn map_engine_error(err: BollardError) -> RuntimeError {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404,
            message,
        } => RuntimeError::NotFound(message),
        BollardError::IOError { err } => RuntimeError::Unavailable(err.to_string()),
        other => RuntimeError::OperationFailed(other.to_string()),
    }
}

impl DockerRuntime {
    /// Connect to the engine at `socket_path`, or auto-detect the platform
    /// default when none is given.
    pub fn new(socket_path: Option<&str>) -> Result<Self, RuntimeError> {
        let docker = if let Some(path) = socket_path {
            #[cfg(unix)]
            let result = Docker::connect_with_unix(path, 120, bollard::API_DEFAULT_VERSION);

            #[cfg(windows)]
            let result = Docker::connect_with_named_pipe(path, 120, bollard::API_DEFAULT_VERSION);

            result.map_err(|e| {
                RuntimeError::Unavailable(format!("cannot connect to engine at {path}: {e}"))
            })?
        } else {
            Docker::connect_with_local_defaults()
                .map_err(|e| RuntimeError::Unavailable(format!("cannot connect to engine: {e}")))?
        };
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<String, RuntimeError> {
        let version = self
            .docker
            .version()
            .await
            .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;
        Ok(version.version.unwrap_or_default())
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        let options = Some(CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| RuntimeError::PullFailed(format!("{image}: {e}")))?;
        }
        debug!(%image, "image pulled");
        Ok(())
    }

    async fn create_container(&self, spec: ContainerSpec) -> Result<String, RuntimeError> {
        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        for mapping in &spec.ports {
            let key = format!("{}/tcp", mapping.container_port);
            exposed_ports.insert(key.clone(), HashMap::new());
            port_bindings.insert(
                key,
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: Some(mapping.host_port.to_string()),
                }]),
            );
        }

        let binds: Vec<String> = spec
            .binds
            .iter()
            .map(|b| {
                let mode = if b.read_only { "ro" } else { "rw" };
                format!("{}:{}:{}", b.source, b.target, mode)
            })
            .collect();

        let restart_policy = match spec.restart {
            RestartPolicyKind::No => None,
            RestartPolicyKind::UnlessStopped => Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::UNLESS_STOPPED),
                maximum_retry_count: None,
            }),
        };

        let host_config = HostConfig {
            binds: if binds.is_empty() { None } else { Some(binds) },
            port_bindings: if port_bindings.is_empty() {
                None
            } else {
                Some(port_bindings)
            },
            restart_policy,
            auto_remove: if spec.auto_remove { Some(true) } else { None },
            ..Default::default()
        };

        let healthcheck = spec.health.as_ref().map(|h| HealthConfig {
            test: Some(h.test.clone()),
            interval: Some(h.interval_secs as i64 * 1_000_000_000),
            timeout: Some(h.timeout_secs as i64 * 1_000_000_000),
            retries: Some(h.retries as i64),
            start_period: Some(h.start_period_secs as i64 * 1_000_000_000),
            ..Default::default()
        });

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };
        let config = Config {
            image: Some(spec.image),
            cmd: spec.cmd,
            env: if spec.env.is_empty() { None } else { Some(spec.env) },
            exposed_ports: if exposed_ports.is_empty() {
                None
            } else {
                Some(exposed_ports)
            },
            healthcheck,
            host_config: Some(host_config),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(map_engine_error)?;
        debug!(container = %spec.name, id = %created.id, "container created");
        Ok(created.id)
    }

    async fn start_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(map_engine_error)
    }

    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker
            .stop_container(name, None::<StopContainerOptions>)
            .await
            .map_err(map_engine_error)
    }

    async fn restart_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker
            .restart_container(name, None::<RestartContainerOptions>)
            .await
            .map_err(map_engine_error)
    }

    async fn remove_container(&self, name: &str, force: bool) -> Result<(), RuntimeError> {
        self.docker
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    force,
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_engine_error)
    }

    async fn inspect_container(&self, name: &str) -> Result<ContainerState, RuntimeError> {
        let info = self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
            .map_err(map_engine_error)?;

        let state = info.state.unwrap_or_default();
        let health = state.health.and_then(|h| match h.status {
            Some(HealthStatusEnum::HEALTHY) => Some(HealthState::Healthy),
            Some(HealthStatusEnum::UNHEALTHY) => Some(HealthState::Unhealthy),
            Some(HealthStatusEnum::STARTING) => Some(HealthState::Starting),
            _ => None,
        });

        let mut ports = HashMap::new();
        if let Some(port_map) = info.network_settings.and_then(|n| n.ports) {
            for (container_port, bindings) in port_map {
                if let Some(binding) = bindings.and_then(|b| b.into_iter().next()) {
                    if let Some(host_port) = binding.host_port.and_then(|p| p.parse().ok()) {
                        ports.insert(container_port, host_port);
                    }
                }
            }
        }

        Ok(ContainerState {
            id: info.id.unwrap_or_default(),
            running: state.running.unwrap_or(false),
            status: state
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            started_at: state.started_at,
            finished_at: state.finished_at,
            health,
            ports,
        })
    }

    async fn wait_container(&self, name: &str) -> Result<(), RuntimeError> {
        let mut stream = self
            .docker
            .wait_container(name, None::<WaitContainerOptions<String>>);
        while let Some(result) = stream.next().await {
            result.map_err(map_engine_error)?;
        }
        Ok(())
    }

    async fn container_logs(&self, name: &str, tail: usize) -> Result<String, RuntimeError> {
        let options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            timestamps: true,
            ..Default::default()
        });

        let mut stream = self.docker.logs(name, options);
        let mut logs = String::new();
        while let Some(entry) = stream.next().await {
            let entry = entry.map_err(map_engine_error)?;
            logs.push_str(&String::from_utf8_lossy(&entry.into_bytes()));
        }
        // Strip stream-multiplexing control bytes.
        Ok(logs.chars().filter(|c| *c > '\u{8}').collect())
    }

    async fn container_stats(&self, name: &str) -> Result<StatsSample, RuntimeError> {
        let options = Some(StatsOptions {
            stream: false,
            one_shot: false,
        });
        let stats = self
            .docker
            .stats(name, options)
            .next()
            .await
            .ok_or_else(|| RuntimeError::OperationFailed("no stats sample".to_string()))?
            .map_err(map_engine_error)?;

        Ok(StatsSample {
            cpu_total_usage: stats.cpu_stats.cpu_usage.total_usage,
            precpu_total_usage: stats.precpu_stats.cpu_usage.total_usage,
            system_cpu_usage: stats.cpu_stats.system_cpu_usage.unwrap_or(0),
            presystem_cpu_usage: stats.precpu_stats.system_cpu_usage.unwrap_or(0),
            online_cpus: stats.cpu_stats.online_cpus.unwrap_or(0),
            memory_usage: stats.memory_stats.usage.unwrap_or(0),
            memory_limit: stats.memory_stats.limit.unwrap_or(0),
        })
    }

    async fn exec(&self, name: &str, cmd: Vec<String>) -> Result<ExecOutput, RuntimeError> {
        let exec = self
            .docker
            .create_exec(
                name,
                CreateExecOptions {
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    cmd: Some(cmd),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| RuntimeError::ExecFailed(e.to_string()))?;

        let results = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| RuntimeError::ExecFailed(e.to_string()))?;

        let mut output = String::new();
        if let StartExecResults::Attached { output: mut stream, .. } = results {
            while let Some(msg) = stream.next().await {
                match msg.map_err(|e| RuntimeError::ExecFailed(e.to_string()))? {
                    LogOutput::StdOut { message } | LogOutput::StdErr { message } => {
                        output.push_str(&String::from_utf8_lossy(&message));
                    }
                    _ => {}
                }
            }
        }
        Ok(ExecOutput { output })
    }

    async fn published_ports(&self) -> Result<HashSet<u16>, RuntimeError> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await
            .map_err(map_engine_error)?;

        let mut taken = HashSet::new();
        for container in containers {
            for port in container.ports.unwrap_or_default() {
                if let Some(public) = port.public_port {
                    taken.insert(public);
                }
            }
        }
        Ok(taken)
    }
}
