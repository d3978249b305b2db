// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Persisted Record Store boundary
//!
//! Repository contracts for the two persisted aggregates. One repository per
//! aggregate root, interface in the domain layer, implementations in
//! `crate::infrastructure::repositories`. The store assigns integer ids; no
//! transaction spans a lifecycle operation, so the orchestration layer must
//! tolerate the store being updated after the runtime action succeeded.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::instance::{Instance, InstanceConfig, InstanceId, InstanceStatus};
use crate::domain::plugin::{PluginId, PluginInstall};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

/// Fields supplied when creating an instance row; the store assigns the id
/// and timestamps.
#[derive(Debug, Clone)]
pub struct NewInstance {
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: InstanceStatus,
    pub config: InstanceConfig,
    pub port: u16,
}

#[async_trait]
pub trait InstanceRepository: Send + Sync {
    /// Insert a new row and return it with its assigned id.
    async fn create(&self, new: NewInstance) -> Result<Instance, RepositoryError>;

    async fn find_by_id(&self, id: InstanceId) -> Result<Option<Instance>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<Instance>, RepositoryError>;

    /// Persist a mutated row (full-row update).
    async fn save(&self, instance: &Instance) -> Result<(), RepositoryError>;

    async fn delete(&self, id: InstanceId) -> Result<(), RepositoryError>;
}

/// Fields supplied when creating a plugin installation row.
#[derive(Debug, Clone)]
pub struct NewPluginInstall {
    pub definition_id: String,
    pub config: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
pub trait PluginRepository: Send + Sync {
    async fn create(&self, new: NewPluginInstall) -> Result<PluginInstall, RepositoryError>;

    async fn find_by_id(&self, id: PluginId) -> Result<Option<PluginInstall>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<PluginInstall>, RepositoryError>;

    async fn save(&self, plugin: &PluginInstall) -> Result<(), RepositoryError>;

    async fn delete(&self, id: PluginId) -> Result<(), RepositoryError>;
}
