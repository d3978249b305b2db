// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Plugin Config Generator
//!
//! Transforms a plugin definition's env template plus user-supplied field
//! values into container launch material. Definition-specific behavior is
//! dispatched through [`InstallStrategy`] variants rather than id-keyed
//! conditionals; every variant answers the same `prepare` call. File writes
//! are scoped to the supplied plugin directories; the record store is never
//! touched here.

use anyhow::{anyhow, Context, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::registry::{InstallStrategy, PluginDefinition};
use crate::domain::runtime::{BindMount, ContainerRuntime, ContainerSpec, PortMapping};

/// On-disk layout of one plugin installation.
#[derive(Debug, Clone)]
pub struct PluginPaths {
    pub root: PathBuf,
    pub data: PathBuf,
    pub config: PathBuf,
}

/// Launch material produced by a strategy's `prepare` step.
#[derive(Debug, Clone, Default)]
pub struct PreparedInstall {
    /// `KEY=value` env entries.
    pub env: Vec<String>,
    /// Container command override, when the plugin is configured via argv.
    pub cmd: Option<Vec<String>>,
    /// Port mappings beyond the definition's primary port.
    pub extra_ports: Vec<PortMapping>,
}

/// 50 alphanumeric characters, for homeserver shared secrets.
pub fn generate_shared_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(50)
        .map(char::from)
        .collect()
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitute `{{field}}` placeholders in the definition's env template.
///
/// A field with no supplied value leaves its placeholder unresolved in the
/// rendered entry; required fields are rejected before this point, so only
/// optional fields can end up unresolved.
pub fn render_env_template(
    template: &BTreeMap<String, String>,
    config: &Map<String, Value>,
) -> Vec<String> {
    template
        .iter()
        .map(|(key, template_value)| {
            let mut value = template_value.clone();
            for (field, supplied) in config {
                let placeholder = format!("{{{{{field}}}}}");
                if value.contains(&placeholder) {
                    value = value.replace(&placeholder, &value_to_string(supplied));
                }
            }
            format!("{key}={value}")
        })
        .collect()
}

/// Reject configs missing a required field before any side effect.
pub fn validate_required_fields(
    definition: &PluginDefinition,
    config: &Map<String, Value>,
) -> Result<()> {
    let missing: Vec<&str> = definition
        .config_fields
        .iter()
        .filter(|field| field.required)
        .filter(|field| match config.get(&field.name) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        })
        .map(|field| field.name.as_str())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(anyhow!(
            "plugin '{}' is missing required config fields: {}",
            definition.id,
            missing.join(", ")
        ))
    }
}

fn config_str<'a>(config: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    config.get(name).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn config_bool(config: &Map<String, Value>, name: &str) -> bool {
    config.get(name).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn config_port(config: &Map<String, Value>, name: &str) -> Option<u16> {
    match config.get(name) {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

impl InstallStrategy {
    /// Produce env vars, launch command and extra port mappings for one
    /// install. Matrix-server installs additionally write their descriptors
    /// and signing key under the plugin's data directory.
    pub async fn prepare(
        &self,
        definition: &PluginDefinition,
        config: &Map<String, Value>,
        paths: &PluginPaths,
        runtime: &dyn ContainerRuntime,
    ) -> Result<PreparedInstall> {
        let env = render_env_template(&definition.env_template, config);
        let mut prepared = PreparedInstall {
            env,
            cmd: None,
            extra_ports: Vec::new(),
        };

        match self {
            InstallStrategy::Generic => {}
            InstallStrategy::MatrixServer => {
                info!(plugin = %definition.id, "generating homeserver config");
                write_homeserver_config(config, &paths.data).await?;
                write_logging_config(&paths.data).await?;
                ensure_signing_key(runtime, &paths.data).await?;
            }
            InstallStrategy::ObjectStore => {
                let console_port = config_port(config, "consolePort").unwrap_or(9001);
                prepared.cmd = Some(vec![
                    "server".to_string(),
                    "/data".to_string(),
                    "--console-address".to_string(),
                    format!(":{console_port}"),
                ]);
                prepared.extra_ports.push(PortMapping {
                    container_port: console_port,
                    host_port: console_port,
                });
            }
            InstallStrategy::InMemoryCache => {
                // Password and memory limit travel as argv, never env.
                if let Some(password) = config_str(config, "password") {
                    let mut cmd = vec![
                        "redis-server".to_string(),
                        "--requirepass".to_string(),
                        password.to_string(),
                    ];
                    if let Some(max_memory) = config.get("maxMemory").and_then(Value::as_u64) {
                        cmd.push("--maxmemory".to_string());
                        cmd.push(format!("{max_memory}mb"));
                    }
                    prepared.cmd = Some(cmd);
                }
            }
            InstallStrategy::ReverseProxy => {
                if let Some(https_port) = config_port(config, "httpsPort") {
                    prepared.extra_ports.push(PortMapping {
                        container_port: 443,
                        host_port: https_port,
                    });
                }
            }
        }

        Ok(prepared)
    }
}

/// Render `homeserver.yaml` for a Matrix homeserver install. The shared
/// secrets are generated once here and live only in the on-disk config.
async fn write_homeserver_config(config: &Map<String, Value>, data_dir: &Path) -> Result<()> {
    let enable_registration = config_bool(config, "enableRegistration");
    let document = json!({
        "server_name": config.get("serverName").map(value_to_string).unwrap_or_default(),
        "pid_file": "/data/homeserver.pid",
        "listeners": [
            {
                "port": 8008,
                "tls": false,
                "type": "http",
                "x_forwarded": true,
                "bind_addresses": ["0.0.0.0"],
                "resources": [
                    {
                        "names": ["client", "federation"],
                        "compress": false,
                    },
                ],
            },
        ],
        "database": {
            "name": "sqlite3",
            "args": {
                "database": "/data/homeserver.db",
            },
        },
        "log_config": "/data/log.config",
        "media_store_path": "/data/media_store",
        "report_stats": config_bool(config, "reportStats"),
        "signing_key_path": "/data/signing.key",
        "trusted_key_servers": [
            {
                "server_name": "matrix.org",
            },
        ],
        "enable_registration": enable_registration,
        "enable_registration_without_verification": enable_registration,
        "registration_shared_secret": config.get("registrationSharedSecret").cloned().unwrap_or(Value::Null),
        "macaroon_secret_key": generate_shared_secret(),
        "form_secret": generate_shared_secret(),
        "suppress_key_server_warning": true,
    });

    let rendered = serde_yaml::to_string(&document).context("serializing homeserver.yaml")?;
    tokio::fs::write(data_dir.join("homeserver.yaml"), rendered)
        .await
        .context("writing homeserver.yaml")?;
    Ok(())
}

async fn write_logging_config(data_dir: &Path) -> Result<()> {
    let document = json!({
        "version": 1,
        "formatters": {
            "precise": {
                "format": "%(asctime)s - %(name)s - %(lineno)d - %(levelname)s - %(request)s - %(message)s",
            },
        },
        "handlers": {
            "console": {
                "class": "logging.StreamHandler",
                "formatter": "precise",
            },
        },
        "loggers": {
            "synapse": {
                "level": "INFO",
            },
            "synapse.storage.SQL": {
                "level": "INFO",
            },
        },
        "root": {
            "level": "INFO",
            "handlers": ["console"],
        },
        "disable_existing_loggers": false,
    });

    let rendered = serde_yaml::to_string(&document).context("serializing log.config")?;
    tokio::fs::write(data_dir.join("log.config"), rendered)
        .await
        .context("writing log.config")?;
    Ok(())
}

/// Generate `/data/signing.key` once, via a disposable keygen container. An
/// existing key is never regenerated. Any generation failure substitutes a
/// placeholder key instead of failing the install.
async fn ensure_signing_key(runtime: &dyn ContainerRuntime, data_dir: &Path) -> Result<()> {
    let key_path = data_dir.join("signing.key");
    if tokio::fs::try_exists(&key_path).await.unwrap_or(false) {
        return Ok(());
    }

    let name = format!("synapse-keygen-{}", Uuid::new_v4());
    let mut spec = ContainerSpec::new(&name, "matrixdotorg/synapse:latest");
    spec.cmd = Some(vec![
        "generate_signing_key".to_string(),
        "-o".to_string(),
        "/data/signing.key".to_string(),
    ]);
    spec.binds = vec![BindMount::read_write(data_dir.display().to_string(), "/data")];
    spec.auto_remove = true;

    let generated = async {
        runtime.create_container(spec).await?;
        runtime.start_container(&name).await?;
        runtime.wait_container(&name).await?;
        Ok::<(), crate::domain::runtime::RuntimeError>(())
    }
    .await;

    let key_present = tokio::fs::try_exists(&key_path).await.unwrap_or(false);
    if generated.is_err() || !key_present {
        if let Err(err) = generated {
            warn!(error = %err, "signing key generation failed, writing placeholder key");
        }
        let secret = generate_shared_secret();
        let placeholder = format!("ed25519 a_{} {}", &secret[..4], secret);
        tokio::fs::write(&key_path, placeholder)
            .await
            .context("writing placeholder signing key")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::definition;

    #[test]
    fn env_template_substitutes_supplied_fields() {
        let postgres = definition("postgres").unwrap();
        let mut config = Map::new();
        config.insert("username".to_string(), json!("admin"));
        config.insert("password".to_string(), json!("s3cret"));
        config.insert("database".to_string(), json!("appdb"));
        let env = render_env_template(&postgres.env_template, &config);
        assert!(env.contains(&"POSTGRES_USER=admin".to_string()));
        assert!(env.contains(&"POSTGRES_PASSWORD=s3cret".to_string()));
        assert!(env.contains(&"POSTGRES_DB=appdb".to_string()));
    }

    #[test]
    fn missing_optional_field_leaves_placeholder_unresolved() {
        let synapse = definition("synapse").unwrap();
        let mut config = Map::new();
        config.insert("serverName".to_string(), json!("matrix.local"));
        let env = render_env_template(&synapse.env_template, &config);
        assert!(env.contains(&"SYNAPSE_SERVER_NAME=matrix.local".to_string()));
        // Known edge case inherited from the template format.
        assert!(env.contains(&"SYNAPSE_REPORT_STATS={{reportStats}}".to_string()));
    }

    #[test]
    fn boolean_and_numeric_values_render_bare() {
        let synapse = definition("synapse").unwrap();
        let mut config = Map::new();
        config.insert("serverName".to_string(), json!("m.local"));
        config.insert("reportStats".to_string(), json!(false));
        config.insert("enableRegistration".to_string(), json!(true));
        let env = render_env_template(&synapse.env_template, &config);
        assert!(env.contains(&"SYNAPSE_REPORT_STATS=false".to_string()));
        assert!(env.contains(&"SYNAPSE_ENABLE_REGISTRATION=true".to_string()));
    }

    #[test]
    fn required_field_validation_rejects_missing_and_empty() {
        let postgres = definition("postgres").unwrap();
        let mut config = Map::new();
        config.insert("username".to_string(), json!("postgres"));
        config.insert("password".to_string(), json!(""));
        config.insert("database".to_string(), json!("openclaw"));
        let err = validate_required_fields(postgres, &config).unwrap_err();
        assert!(err.to_string().contains("password"));

        config.insert("password".to_string(), json!("pw"));
        validate_required_fields(postgres, &config).unwrap();
    }

    #[test]
    fn shared_secret_is_alphanumeric_and_sized() {
        let secret = generate_shared_secret();
        assert_eq!(secret.len(), 50);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
