// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Process-level configuration for the orchestration core, loadable from a
/// YAML file. Defaults match the reference single-host deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Base directory holding one subdirectory per instance.
    pub instances_path: PathBuf,
    /// Base directory holding one subdirectory per plugin installation.
    pub plugins_path: PathBuf,
    /// Image every agent gateway container runs.
    pub instance_image: String,
    /// Engine control socket; `None` auto-detects the local default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_socket: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            instances_path: PathBuf::from("/home/ubuntu/openclaw-instances"),
            plugins_path: PathBuf::from("/home/ubuntu/openclaw-plugins"),
            instance_image: "openclaw:local".to_string(),
            docker_socket: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_reference_layout() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.instance_image, "openclaw:local");
        assert!(config.instances_path.ends_with("openclaw-instances"));
        assert!(config.docker_socket.is_none());
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_the_rest() {
        let config: OrchestratorConfig =
            serde_yaml::from_str("instance_image: openclaw:v2\n").unwrap();
        assert_eq!(config.instance_image, "openclaw:v2");
        assert!(config.plugins_path.ends_with("openclaw-plugins"));
    }
}
