// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory record store implementations. Process-local; the dashboard's
//! durable store plugs in behind the same traits.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::instance::{Instance, InstanceId};
use crate::domain::plugin::{ContainerStatus, PluginId, PluginInstall};
use crate::domain::repository::{
    InstanceRepository, NewInstance, NewPluginInstall, PluginRepository, RepositoryError,
};

#[derive(Clone)]
pub struct InMemoryInstanceRepository {
    instances: Arc<Mutex<HashMap<InstanceId, Instance>>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryInstanceRepository {
    pub fn new() -> Self {
        Self {
            instances: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }
}

impl Default for InMemoryInstanceRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InstanceRepository for InMemoryInstanceRepository {
    async fn create(&self, new: NewInstance) -> Result<Instance, RepositoryError> {
        let id = InstanceId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let now = Utc::now();
        let instance = Instance {
            id,
            user_id: new.user_id,
            name: new.name,
            description: new.description,
            status: new.status,
            config: new.config,
            port: new.port,
            created_at: now,
            updated_at: now,
        };
        let mut instances = self
            .instances
            .lock()
            .map_err(|_| RepositoryError::Store("Mutex poisoned".to_string()))?;
        instances.insert(id, instance.clone());
        Ok(instance)
    }

    async fn find_by_id(&self, id: InstanceId) -> Result<Option<Instance>, RepositoryError> {
        let instances = self
            .instances
            .lock()
            .map_err(|_| RepositoryError::Store("Mutex poisoned".to_string()))?;
        Ok(instances.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Instance>, RepositoryError> {
        let instances = self
            .instances
            .lock()
            .map_err(|_| RepositoryError::Store("Mutex poisoned".to_string()))?;
        let mut all: Vec<Instance> = instances.values().cloned().collect();
        all.sort_by_key(|i| i.id.as_i64());
        Ok(all)
    }

    async fn save(&self, instance: &Instance) -> Result<(), RepositoryError> {
        let mut instances = self
            .instances
            .lock()
            .map_err(|_| RepositoryError::Store("Mutex poisoned".to_string()))?;
        instances.insert(instance.id, instance.clone());
        Ok(())
    }

    async fn delete(&self, id: InstanceId) -> Result<(), RepositoryError> {
        let mut instances = self
            .instances
            .lock()
            .map_err(|_| RepositoryError::Store("Mutex poisoned".to_string()))?;
        instances
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("instance {id}")))
    }
}

#[derive(Clone)]
pub struct InMemoryPluginRepository {
    plugins: Arc<Mutex<HashMap<PluginId, PluginInstall>>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryPluginRepository {
    pub fn new() -> Self {
        Self {
            plugins: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }
}

impl Default for InMemoryPluginRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginRepository for InMemoryPluginRepository {
    async fn create(&self, new: NewPluginInstall) -> Result<PluginInstall, RepositoryError> {
        let id = PluginId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let now = Utc::now();
        let plugin = PluginInstall {
            id,
            definition_id: new.definition_id,
            container_status: ContainerStatus::NotInstalled,
            host_port: None,
            container_id: None,
            config: new.config,
            created_at: now,
            updated_at: now,
        };
        let mut plugins = self
            .plugins
            .lock()
            .map_err(|_| RepositoryError::Store("Mutex poisoned".to_string()))?;
        plugins.insert(id, plugin.clone());
        Ok(plugin)
    }

    async fn find_by_id(&self, id: PluginId) -> Result<Option<PluginInstall>, RepositoryError> {
        let plugins = self
            .plugins
            .lock()
            .map_err(|_| RepositoryError::Store("Mutex poisoned".to_string()))?;
        Ok(plugins.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<PluginInstall>, RepositoryError> {
        let plugins = self
            .plugins
            .lock()
            .map_err(|_| RepositoryError::Store("Mutex poisoned".to_string()))?;
        let mut all: Vec<PluginInstall> = plugins.values().cloned().collect();
        all.sort_by_key(|p| p.id.as_i64());
        Ok(all)
    }

    async fn save(&self, plugin: &PluginInstall) -> Result<(), RepositoryError> {
        let mut plugins = self
            .plugins
            .lock()
            .map_err(|_| RepositoryError::Store("Mutex poisoned".to_string()))?;
        plugins.insert(plugin.id, plugin.clone());
        Ok(())
    }

    async fn delete(&self, id: PluginId) -> Result<(), RepositoryError> {
        let mut plugins = self
            .plugins
            .lock()
            .map_err(|_| RepositoryError::Store("Mutex poisoned".to_string()))?;
        plugins
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("plugin {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instance::{InstanceConfig, InstanceStatus};

    fn config(port: u16) -> InstanceConfig {
        InstanceConfig {
            name: "test".to_string(),
            provider: "anthropic".to_string(),
            model: None,
            api_key: "sk-test".to_string(),
            base_url: None,
            telegram: None,
            discord: None,
            slack: None,
            matrix: None,
            port,
        }
    }

    #[tokio::test]
    async fn ids_are_assigned_sequentially() {
        let repo = InMemoryInstanceRepository::new();
        let first = repo
            .create(NewInstance {
                user_id: 1,
                name: "a".to_string(),
                description: None,
                status: InstanceStatus::Stopped,
                config: config(18790),
                port: 18790,
            })
            .await
            .unwrap();
        let second = repo
            .create(NewInstance {
                user_id: 1,
                name: "b".to_string(),
                description: None,
                status: InstanceStatus::Stopped,
                config: config(18791),
                port: 18791,
            })
            .await
            .unwrap();
        assert_eq!(first.id.as_i64(), 1);
        assert_eq!(second.id.as_i64(), 2);
    }

    #[tokio::test]
    async fn delete_of_a_missing_row_errors() {
        let repo = InMemoryPluginRepository::new();
        let err = repo.delete(PluginId::new(7)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }
}
