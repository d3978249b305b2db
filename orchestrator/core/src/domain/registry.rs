// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Plugin Definition Registry
//!
//! Static catalog of installable infrastructure plugin templates: image,
//! ports, data volume, env-var templates (`{{field}}` placeholders) and the
//! typed config fields the dashboard renders. Definitions are read-only,
//! process-wide data; installations reference them by `id`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Select,
    Password,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

/// One typed config field of a plugin definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
}

impl ConfigField {
    fn text(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            field_type: FieldType::Text,
            required: false,
            default: None,
            placeholder: None,
            description: None,
            options: Vec::new(),
        }
    }

    fn typed(name: &str, label: &str, field_type: FieldType) -> Self {
        Self {
            field_type,
            ..Self::text(name, label)
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn placeholder(mut self, text: &str) -> Self {
        self.placeholder = Some(text.to_string());
        self
    }

    fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthProbe {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Infrastructure,
    Channel,
    Deployment,
    Monitoring,
    SkillProvider,
    Other,
}

/// Install-time behavior variant carried by each definition.
///
/// Keeps the installer definition-agnostic: every variant implements the same
/// `prepare(definition, config, paths, runtime)` step in the application
/// layer, returning env vars, launch command and extra port mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStrategy {
    /// Env-template substitution only.
    Generic,
    /// Matrix homeserver: generated server/logging descriptors + signing key.
    MatrixServer,
    /// Object storage: second console port and explicit launch command.
    ObjectStore,
    /// In-memory cache: password and memory limit passed as argv, not env.
    InMemoryCache,
    /// Reverse proxy: conditional HTTPS port.
    ReverseProxy,
}

/// Static template describing how to install a given plugin kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDefinition {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub kind: PluginKind,
    pub version: String,
    pub author: String,
    /// Lucide icon name rendered by the dashboard.
    pub icon: String,
    pub image: String,
    pub tag: String,
    pub default_port: u16,
    pub container_port: u16,
    /// Container path bound to the plugin's data directory.
    pub data_volume: String,
    pub env_template: BTreeMap<String, String>,
    pub config_fields: Vec<ConfigField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthProbe>,
    pub strategy: InstallStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

impl PluginDefinition {
    /// Full `image:tag` reference for pulls and creates.
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    pub fn field(&self, name: &str) -> Option<&ConfigField> {
        self.config_fields.iter().find(|f| f.name == name)
    }
}

fn env_template(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

static REGISTRY: LazyLock<Vec<PluginDefinition>> = LazyLock::new(|| {
    vec![
        PluginDefinition {
            id: "synapse".to_string(),
            name: "synapse".to_string(),
            display_name: "Matrix Synapse".to_string(),
            description: "Matrix protocol homeserver; connect Element clients for secure messaging".to_string(),
            kind: PluginKind::Infrastructure,
            version: "1.0.0".to_string(),
            author: "Matrix.org".to_string(),
            icon: "Server".to_string(),
            image: "matrixdotorg/synapse".to_string(),
            tag: "latest".to_string(),
            default_port: 8008,
            container_port: 8008,
            data_volume: "/data".to_string(),
            env_template: env_template(&[
                ("SYNAPSE_SERVER_NAME", "{{serverName}}"),
                ("SYNAPSE_REPORT_STATS", "{{reportStats}}"),
                ("SYNAPSE_ENABLE_REGISTRATION", "{{enableRegistration}}"),
            ]),
            config_fields: vec![
                ConfigField::text("serverName", "Server name")
                    .required()
                    .default_value(json!("matrix.local"))
                    .placeholder("matrix.example.com")
                    .description("Identifies your Matrix server; a domain name is recommended"),
                ConfigField::typed("httpPort", "HTTP port", FieldType::Number)
                    .default_value(json!(8008))
                    .description("Host port the homeserver is published on"),
                ConfigField::typed("enableRegistration", "Allow registration", FieldType::Boolean)
                    .default_value(json!(true))
                    .description("Let new users register accounts themselves"),
                ConfigField::typed("reportStats", "Anonymous statistics", FieldType::Boolean)
                    .default_value(json!(false))
                    .description("Report anonymous usage statistics to Matrix.org"),
            ],
            health: Some(HealthProbe {
                endpoint: Some("/_matrix/client/versions".to_string()),
                interval_secs: 30,
            }),
            strategy: InstallStrategy::MatrixServer,
            documentation: Some("https://matrix-org.github.io/synapse/latest/".to_string()),
        },
        PluginDefinition {
            id: "postgres".to_string(),
            name: "postgres".to_string(),
            display_name: "PostgreSQL".to_string(),
            description: "Open-source relational database for complex queries and large datasets".to_string(),
            kind: PluginKind::Infrastructure,
            version: "16.0".to_string(),
            author: "PostgreSQL Global Development Group".to_string(),
            icon: "Database".to_string(),
            image: "postgres".to_string(),
            tag: "16-alpine".to_string(),
            default_port: 5432,
            container_port: 5432,
            data_volume: "/var/lib/postgresql/data".to_string(),
            env_template: env_template(&[
                ("POSTGRES_USER", "{{username}}"),
                ("POSTGRES_PASSWORD", "{{password}}"),
                ("POSTGRES_DB", "{{database}}"),
            ]),
            config_fields: vec![
                ConfigField::text("username", "Username")
                    .required()
                    .default_value(json!("postgres"))
                    .placeholder("postgres"),
                ConfigField::typed("password", "Password", FieldType::Password)
                    .required()
                    .placeholder("Set a database password")
                    .description("Choose a strong password"),
                ConfigField::text("database", "Database name")
                    .required()
                    .default_value(json!("openclaw"))
                    .placeholder("openclaw"),
                ConfigField::typed("port", "Port", FieldType::Number).default_value(json!(5432)),
            ],
            health: Some(HealthProbe {
                endpoint: None,
                interval_secs: 30,
            }),
            strategy: InstallStrategy::Generic,
            documentation: Some("https://www.postgresql.org/docs/".to_string()),
        },
        PluginDefinition {
            id: "redis".to_string(),
            name: "redis".to_string(),
            display_name: "Redis".to_string(),
            description: "In-memory data store for caching, queues and session storage".to_string(),
            kind: PluginKind::Infrastructure,
            version: "7.0".to_string(),
            author: "Redis Ltd.".to_string(),
            icon: "Zap".to_string(),
            image: "redis".to_string(),
            tag: "7-alpine".to_string(),
            default_port: 6379,
            container_port: 6379,
            data_volume: "/data".to_string(),
            env_template: BTreeMap::new(),
            config_fields: vec![
                ConfigField::typed("port", "Port", FieldType::Number).default_value(json!(6379)),
                ConfigField::typed("password", "Password", FieldType::Password)
                    .placeholder("Optional access password")
                    .description("Leave empty to disable password authentication"),
                ConfigField::typed("maxMemory", "Max memory (MB)", FieldType::Number)
                    .default_value(json!(256))
                    .description("Upper bound on memory Redis may use"),
            ],
            health: Some(HealthProbe {
                endpoint: None,
                interval_secs: 30,
            }),
            strategy: InstallStrategy::InMemoryCache,
            documentation: Some("https://redis.io/docs/".to_string()),
        },
        PluginDefinition {
            id: "minio".to_string(),
            name: "minio".to_string(),
            display_name: "MinIO".to_string(),
            description: "S3-compatible object storage for files and backups".to_string(),
            kind: PluginKind::Infrastructure,
            version: "latest".to_string(),
            author: "MinIO, Inc.".to_string(),
            icon: "HardDrive".to_string(),
            image: "minio/minio".to_string(),
            tag: "latest".to_string(),
            default_port: 9000,
            container_port: 9000,
            data_volume: "/data".to_string(),
            env_template: env_template(&[
                ("MINIO_ROOT_USER", "{{accessKey}}"),
                ("MINIO_ROOT_PASSWORD", "{{secretKey}}"),
            ]),
            config_fields: vec![
                ConfigField::text("accessKey", "Access key")
                    .required()
                    .default_value(json!("minioadmin"))
                    .placeholder("minioadmin"),
                ConfigField::typed("secretKey", "Secret key", FieldType::Password)
                    .required()
                    .placeholder("Set a secret key")
                    .description("At least 8 characters"),
                ConfigField::typed("apiPort", "API port", FieldType::Number).default_value(json!(9000)),
                ConfigField::typed("consolePort", "Console port", FieldType::Number)
                    .default_value(json!(9001)),
            ],
            health: Some(HealthProbe {
                endpoint: Some("/minio/health/live".to_string()),
                interval_secs: 30,
            }),
            strategy: InstallStrategy::ObjectStore,
            documentation: Some("https://min.io/docs/minio/container/index.html".to_string()),
        },
        PluginDefinition {
            id: "nginx".to_string(),
            name: "nginx".to_string(),
            display_name: "Nginx".to_string(),
            description: "Web server and reverse proxy for load balancing and static files".to_string(),
            kind: PluginKind::Infrastructure,
            version: "1.25".to_string(),
            author: "Nginx, Inc.".to_string(),
            icon: "Globe".to_string(),
            image: "nginx".to_string(),
            tag: "alpine".to_string(),
            default_port: 80,
            container_port: 80,
            data_volume: "/usr/share/nginx/html".to_string(),
            env_template: BTreeMap::new(),
            config_fields: vec![
                ConfigField::typed("httpPort", "HTTP port", FieldType::Number).default_value(json!(80)),
                ConfigField::typed("httpsPort", "HTTPS port", FieldType::Number)
                    .default_value(json!(443)),
            ],
            health: Some(HealthProbe {
                endpoint: Some("/".to_string()),
                interval_secs: 30,
            }),
            strategy: InstallStrategy::ReverseProxy,
            documentation: Some("https://nginx.org/en/docs/".to_string()),
        },
    ]
});

/// Look up a plugin definition by id.
pub fn definition(id: &str) -> Option<&'static PluginDefinition> {
    REGISTRY.iter().find(|d| d.id == id)
}

/// All registered plugin definitions.
pub fn all_definitions() -> &'static [PluginDefinition] {
    &REGISTRY
}

/// Definitions filtered by kind.
pub fn definitions_by_kind(kind: PluginKind) -> Vec<&'static PluginDefinition> {
    REGISTRY.iter().filter(|d| d.kind == kind).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_holds_the_five_builtin_definitions() {
        let ids: Vec<&str> = all_definitions().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["synapse", "postgres", "redis", "minio", "nginx"]);
    }

    #[test]
    fn definition_lookup_by_id() {
        let synapse = definition("synapse").unwrap();
        assert_eq!(synapse.image_ref(), "matrixdotorg/synapse:latest");
        assert_eq!(synapse.container_port, 8008);
        assert_eq!(synapse.strategy, InstallStrategy::MatrixServer);
        assert!(definition("etcd").is_none());
    }

    #[test]
    fn strategies_match_their_definitions() {
        assert_eq!(definition("postgres").unwrap().strategy, InstallStrategy::Generic);
        assert_eq!(definition("redis").unwrap().strategy, InstallStrategy::InMemoryCache);
        assert_eq!(definition("minio").unwrap().strategy, InstallStrategy::ObjectStore);
        assert_eq!(definition("nginx").unwrap().strategy, InstallStrategy::ReverseProxy);
    }

    #[test]
    fn required_fields_are_flagged() {
        let postgres = definition("postgres").unwrap();
        assert!(postgres.field("password").unwrap().required);
        assert!(!postgres.field("port").unwrap().required);
    }
}
