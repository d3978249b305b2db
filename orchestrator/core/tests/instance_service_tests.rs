// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use common::FakeRuntime;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tempfile::TempDir;

use openclaw_orchestrator::application::engine_availability;
use openclaw_orchestrator::application::instance_lifecycle::InstanceManager;
use openclaw_orchestrator::application::instance_service::{InstanceService, InstanceUpdate};
use openclaw_orchestrator::application::plugin_lifecycle::PluginManager;
use openclaw_orchestrator::application::plugin_service::PluginService;
use openclaw_orchestrator::domain::instance::{InstanceConfig, InstanceStatus};
use openclaw_orchestrator::domain::plugin::ContainerStatus;
use openclaw_orchestrator::domain::repository::InstanceRepository;
use openclaw_orchestrator::infrastructure::repositories::{
    InMemoryInstanceRepository, InMemoryPluginRepository,
};

fn service() -> (Arc<FakeRuntime>, Arc<InMemoryInstanceRepository>, InstanceService, TempDir) {
    let runtime = Arc::new(FakeRuntime::new());
    let repo = Arc::new(InMemoryInstanceRepository::new());
    let dir = tempfile::tempdir().unwrap();
    let manager = InstanceManager::new(
        runtime.clone(),
        dir.path().to_path_buf(),
        "openclaw:local".to_string(),
    );
    let service = InstanceService::new(repo.clone(), manager);
    (runtime, repo, service, dir)
}

fn config() -> InstanceConfig {
    InstanceConfig {
        name: "assistant".to_string(),
        provider: "anthropic".to_string(),
        model: Some("claude-3".to_string()),
        api_key: "sk-ant-secret".to_string(),
        base_url: None,
        telegram: None,
        discord: None,
        slack: None,
        matrix: None,
        port: 0,
    }
}

#[tokio::test]
async fn instances_get_sequential_ports_from_the_base() {
    let (runtime, _repo, service, dir) = service();

    let first = service.create(1, "a".to_string(), None, config()).await.unwrap();
    let second = service.create(1, "b".to_string(), None, config()).await.unwrap();
    assert_eq!(first.port, 18790);
    assert_eq!(second.port, 18791);
    assert_eq!(first.status, InstanceStatus::Running);

    // Gateway publishes its fixed internal port on the allocated host port.
    let container = runtime.container("openclaw-1").unwrap();
    assert_eq!(container.spec.ports[0].container_port, 18789);
    assert_eq!(container.spec.ports[0].host_port, 18790);
    assert!(container.running);

    // The generated document landed in the instance's config directory.
    let config_path = dir.path().join("1").join("config").join("openclaw.json");
    assert!(tokio::fs::try_exists(&config_path).await.unwrap());
}

#[tokio::test]
async fn caller_supplied_port_is_ignored() {
    let (_runtime, _repo, service, _dir) = service();
    let mut custom = config();
    custom.port = 9999;
    let instance = service.create(1, "a".to_string(), None, custom).await.unwrap();
    assert_eq!(instance.port, 18790);
    assert_eq!(instance.config.port, 18790);
}

#[tokio::test]
async fn gateway_container_carries_the_provider_key_in_env() {
    let (runtime, _repo, service, _dir) = service();
    service.create(1, "a".to_string(), None, config()).await.unwrap();
    let container = runtime.container("openclaw-1").unwrap();
    assert!(container.spec.env.contains(&"ANTHROPIC_API_KEY=sk-ant-secret".to_string()));
    assert!(container.spec.env.contains(&"NODE_ENV=production".to_string()));
    assert!(container
        .spec
        .env
        .iter()
        .any(|e| e.starts_with("OPENCLAW_GATEWAY_TOKEN=")));
}

#[tokio::test]
async fn failed_provisioning_marks_the_row_error_and_propagates() {
    let (runtime, repo, service, _dir) = service();
    runtime
        .fail_name_prefixes
        .lock()
        .unwrap()
        .push("openclaw-".to_string());

    assert!(service.create(1, "a".to_string(), None, config()).await.is_err());

    let rows = repo.list_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, InstanceStatus::Error);
}

#[tokio::test]
async fn stop_and_start_keep_the_store_in_sync() {
    let (runtime, _repo, service, _dir) = service();
    let instance = service.create(1, "a".to_string(), None, config()).await.unwrap();

    let stopped = service.stop(instance.id).await.unwrap();
    assert_eq!(stopped.status, InstanceStatus::Stopped);
    assert!(!runtime.container("openclaw-1").unwrap().running);

    let started = service.start(instance.id).await.unwrap();
    assert_eq!(started.status, InstanceStatus::Running);
    assert!(runtime.container("openclaw-1").unwrap().running);
}

#[tokio::test]
async fn start_recreates_the_container_from_stored_config() {
    let (runtime, _repo, service, _dir) = service();
    let instance = service.create(1, "a".to_string(), None, config()).await.unwrap();
    let before = runtime.container("openclaw-1").unwrap();

    service.stop(instance.id).await.unwrap();
    service.start(instance.id).await.unwrap();

    let after = runtime.container("openclaw-1").unwrap();
    assert_ne!(before.id, after.id);
    assert_eq!(after.spec.ports[0].host_port, 18790);
}

#[tokio::test]
async fn updating_a_running_instance_applies_the_new_config() {
    let (runtime, _repo, service, _dir) = service();
    let instance = service.create(1, "a".to_string(), None, config()).await.unwrap();

    let mut new_config = config();
    new_config.provider = "openai".to_string();
    new_config.api_key = "sk-openai".to_string();
    new_config.port = 4242; // must be ignored
    let updated = service
        .update(
            instance.id,
            InstanceUpdate {
                name: Some("renamed".to_string()),
                config: Some(new_config),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.config.port, 18790);

    let container = runtime.container("openclaw-1").unwrap();
    assert!(container.running);
    assert!(container.spec.env.contains(&"OPENAI_API_KEY=sk-openai".to_string()));
    assert_eq!(container.spec.ports[0].host_port, 18790);
}

#[tokio::test]
async fn updating_a_stopped_instance_does_not_start_it() {
    let (runtime, _repo, service, _dir) = service();
    let instance = service.create(1, "a".to_string(), None, config()).await.unwrap();
    service.stop(instance.id).await.unwrap();

    let before = runtime.container("openclaw-1").unwrap();
    service
        .update(
            instance.id,
            InstanceUpdate {
                description: Some("notes".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let after = runtime.container("openclaw-1").unwrap();
    assert_eq!(before.id, after.id);
    assert!(!after.running);
}

#[tokio::test]
async fn delete_removes_container_row_and_directories() {
    let (runtime, repo, service, dir) = service();
    let instance = service.create(1, "a".to_string(), None, config()).await.unwrap();

    service.delete(instance.id).await.unwrap();

    assert!(runtime.container("openclaw-1").is_none());
    assert!(repo.find_by_id(instance.id).await.unwrap().is_none());
    assert!(!tokio::fs::try_exists(dir.path().join("1")).await.unwrap());
}

#[tokio::test]
async fn delete_survives_a_missing_container() {
    let (runtime, repo, service, _dir) = service();
    let instance = service.create(1, "a".to_string(), None, config()).await.unwrap();
    runtime.containers.lock().unwrap().clear();

    service.delete(instance.id).await.unwrap();
    assert!(repo.find_by_id(instance.id).await.unwrap().is_none());
}

#[tokio::test]
async fn skill_install_writes_the_file_and_restarts() {
    let (runtime, _repo, service, dir) = service();
    let instance = service.create(1, "a".to_string(), None, config()).await.unwrap();
    service.stop(instance.id).await.unwrap();

    service
        .install_skill(instance.id, "weather", "# Weather skill\n")
        .await
        .unwrap();

    let skill = dir
        .path()
        .join("1")
        .join("workspace")
        .join("skills")
        .join("weather.md");
    assert_eq!(tokio::fs::read_to_string(&skill).await.unwrap(), "# Weather skill\n");
    assert!(runtime.container("openclaw-1").unwrap().running);
}

#[tokio::test]
async fn stats_derive_percentages_from_the_sample() {
    let (runtime, _repo, service, _dir) = service();
    let instance = service.create(1, "a".to_string(), None, config()).await.unwrap();

    {
        let mut stats = runtime.stats.lock().unwrap();
        stats.cpu_total_usage = 300;
        stats.precpu_total_usage = 100;
        stats.system_cpu_usage = 1_000;
        stats.presystem_cpu_usage = 600;
        stats.online_cpus = 2;
        stats.memory_usage = 512;
        stats.memory_limit = 2048;
    }

    let usage = service.stats(instance.id).await.unwrap();
    assert!((usage.cpu_percent - 100.0).abs() < f64::EPSILON);
    assert!((usage.memory_percent - 25.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn engine_availability_reports_without_failing() {
    let runtime = FakeRuntime::new();
    let report = engine_availability(&runtime).await;
    assert!(report.available);
    assert_eq!(report.version.as_deref(), Some("27.0-fake"));

    runtime.unavailable.store(true, Ordering::SeqCst);
    let report = engine_availability(&runtime).await;
    assert!(!report.available);
    assert!(report.error.is_some());
}

#[tokio::test]
async fn plugin_status_degrades_to_the_store_when_the_engine_is_down() {
    let runtime = Arc::new(FakeRuntime::new());
    let repo = Arc::new(InMemoryPluginRepository::new());
    let dir = tempfile::tempdir().unwrap();
    let manager = Arc::new(PluginManager::new(runtime.clone(), dir.path().to_path_buf()));
    let service = PluginService::new(repo, manager);

    let plugin = service.register("redis").await.unwrap();
    let plugin = service
        .install(plugin.id, [("port".to_string(), json!(7000))].into_iter().collect())
        .await
        .unwrap();
    assert_eq!(plugin.container_status, ContainerStatus::Running);
    assert_eq!(plugin.host_port, Some(7000));

    runtime.unavailable.store(true, Ordering::SeqCst);
    let status = service.status(plugin.id).await.unwrap();
    assert_eq!(status.status, ContainerStatus::Running);
    assert!(status.running);
    assert!(status.error.is_some());

    // Back online, the live answer wins again.
    runtime.unavailable.store(false, Ordering::SeqCst);
    let status = service.status(plugin.id).await.unwrap();
    assert!(status.error.is_none());
}

#[tokio::test]
async fn plugin_uninstall_resets_the_row() {
    let runtime = Arc::new(FakeRuntime::new());
    let repo = Arc::new(InMemoryPluginRepository::new());
    let dir = tempfile::tempdir().unwrap();
    let manager = Arc::new(PluginManager::new(runtime, dir.path().to_path_buf()));
    let service = PluginService::new(repo, manager);

    let plugin = service.register("redis").await.unwrap();
    service.install(plugin.id, serde_json::Map::new()).await.unwrap();
    let plugin = service.uninstall(plugin.id, true).await.unwrap();

    assert_eq!(plugin.container_status, ContainerStatus::NotInstalled);
    assert!(plugin.host_port.is_none());
    assert!(plugin.container_id.is_none());
}
