//! The service manager: registry, ordering, persistence, control surface.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use svc_common::{ServiceError, ServiceResult};
use svc_state::ServiceState;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{default_catalog, ServiceConfig, ServiceRegistry};
use crate::controller::{OsProcessController, ProcessController};
use crate::events::{ErrorCallback, EventSinks, StatusCallback};
use crate::ordering::startup_order;
use crate::resources::ResourceSampler;
use crate::service::{Service, MONITOR_INTERVAL};
use crate::snapshot::{ServiceSnapshot, StateSnapshot};
use crate::status::ServiceStatus;

struct HeartbeatHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns the service registry and exposes the supervisor's control surface.
///
/// Handles are cloned out of the map before any await, so no lock is ever
/// held across service operations. The registry file is rewritten on every
/// mutating call.
pub struct ServiceManager {
    services: Arc<RwLock<HashMap<String, Service>>>,
    controller: Arc<dyn ProcessController>,
    events: Arc<EventSinks>,
    sampler: Arc<ResourceSampler>,
    registry_path: PathBuf,
    monitor_interval: Duration,
    heartbeat: Mutex<Option<HeartbeatHandle>>,
}

impl ServiceManager {
    /// Manager backed by real OS processes.
    pub fn new<P: AsRef<Path>>(registry_path: P) -> Self {
        Self::with_controller(registry_path, Arc::new(OsProcessController::new()))
    }

    /// Manager with a custom process controller (used by tests).
    pub fn with_controller<P: AsRef<Path>>(
        registry_path: P,
        controller: Arc<dyn ProcessController>,
    ) -> Self {
        Self {
            services: Arc::new(RwLock::new(HashMap::new())),
            controller,
            events: Arc::new(EventSinks::new()),
            sampler: Arc::new(ResourceSampler::new()),
            registry_path: registry_path.as_ref().to_path_buf(),
            monitor_interval: MONITOR_INTERVAL,
            heartbeat: Mutex::new(None),
        }
    }

    /// Tick rate for per-service monitor loops (default 1s). Applies to
    /// services registered after the call.
    pub fn set_monitor_interval(&mut self, interval: Duration) {
        self.monitor_interval = interval;
    }

    /// Load the registry file if it exists, otherwise install the default
    /// catalog and persist it.
    pub async fn initialize(&self) -> ServiceResult<()> {
        if self.registry_path.exists() {
            let registry = ServiceRegistry::load_from_file(&self.registry_path)
                .map_err(|e| ServiceError::persistence(e.to_string()))?;
            let count = registry.services.len();
            for config in registry.services {
                self.insert_service(config)?;
            }
            info!(
                "Loaded {} service(s) from {}",
                count,
                self.registry_path.display()
            );
        } else {
            info!(
                "No registry at {}, installing default catalog",
                self.registry_path.display()
            );
            for config in default_catalog() {
                self.insert_service(config)?;
            }
            self.save_registry().await?;
        }
        Ok(())
    }

    /// Register a new service and persist the registry.
    pub async fn register_service(&self, config: ServiceConfig) -> ServiceResult<()> {
        let name = config.name.clone();
        self.insert_service(config)?;
        self.save_registry().await?;
        info!("Registered service '{}'", name);
        Ok(())
    }

    /// Stop and remove a service, then persist the registry.
    ///
    /// If the stop fails the service stays registered and the error
    /// propagates; silently dropping a live process would orphan it.
    pub async fn unregister_service(&self, name: &str) -> ServiceResult<()> {
        let service = self.service(name)?;
        service.stop().await?;

        self.write_services().remove(name);
        self.save_registry().await?;
        info!("Unregistered service '{}'", name);
        Ok(())
    }

    pub async fn start_service(&self, name: &str) -> ServiceResult<()> {
        self.service(name)?.start().await
    }

    pub async fn stop_service(&self, name: &str) -> ServiceResult<()> {
        self.service(name)?.stop().await
    }

    pub async fn restart_service(&self, name: &str) -> ServiceResult<()> {
        self.service(name)?.restart().await
    }

    /// Start every auto_start service, dependencies before dependents,
    /// priority ordering the ties. Best-effort: failures are collected and
    /// reported together after everything startable was attempted.
    pub async fn start_all_services(&self) -> ServiceResult<()> {
        let configs = self.config_snapshot();
        let order = startup_order(&configs);
        info!("Starting {} service(s): {:?}", order.len(), order);

        let mut failures = Vec::new();
        for name in &order {
            let Ok(service) = self.service(name) else {
                continue; // Unregistered concurrently
            };
            if !service.config().auto_start {
                debug!("Skipping '{}' (auto_start disabled)", name);
                continue;
            }
            if let Err(e) = service.start().await {
                warn!("Failed to start '{}': {}", name, e);
                failures.push(name.clone());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::start_failed(
                "startup",
                format!("failed to start: {}", failures.join(", ")),
            ))
        }
    }

    /// Stop every service in reverse startup order. Best-effort.
    pub async fn stop_all_services(&self) -> ServiceResult<()> {
        let configs = self.config_snapshot();
        let mut order = startup_order(&configs);
        order.reverse();
        info!("Stopping {} service(s): {:?}", order.len(), order);

        let mut failures = Vec::new();
        for name in &order {
            let Ok(service) = self.service(name) else {
                continue;
            };
            if let Err(e) = service.stop().await {
                warn!("Failed to stop '{}': {}", name, e);
                failures.push(name.clone());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::stop_failed(
                "shutdown",
                format!("failed to stop: {}", failures.join(", ")),
            ))
        }
    }

    /// Status of one service. Unknown names yield the Unknown sentinel
    /// rather than an error, so status queries never fail.
    pub fn get_service_status(&self, name: &str) -> ServiceStatus {
        match self.service(name) {
            Ok(service) => service.status(),
            Err(_) => ServiceStatus::unknown(format!("service not found: {}", name)),
        }
    }

    pub fn is_service_running(&self, name: &str) -> bool {
        self.service(name)
            .map(|s| s.is_running())
            .unwrap_or(false)
    }

    /// Registered service names, sorted.
    pub fn get_service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_services().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get_service_config(&self, name: &str) -> ServiceResult<ServiceConfig> {
        Ok(self.service(name)?.config())
    }

    /// Replace a service's configuration and persist the registry. Takes
    /// effect on the service's next start.
    pub async fn set_service_config(&self, name: &str, config: ServiceConfig) -> ServiceResult<()> {
        self.service(name)?.set_config(config)?;
        self.save_registry().await
    }

    /// Toggle auto_start and persist the registry.
    pub async fn set_service_enabled(&self, name: &str, enabled: bool) -> ServiceResult<()> {
        let service = self.service(name)?;
        let mut config = service.config();
        config.auto_start = enabled;
        service.set_config(config)?;
        self.save_registry().await?;
        info!(
            "Service '{}' auto_start {}",
            name,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// Re-read the registry file and register entries not yet present.
    /// Existing services keep their running definition.
    pub async fn reload_config(&self) -> ServiceResult<usize> {
        let registry = ServiceRegistry::load_from_file(&self.registry_path)
            .map_err(|e| ServiceError::persistence(e.to_string()))?;

        let mut added = 0;
        for config in registry.services {
            let exists = self.read_services().contains_key(&config.name);
            if !exists {
                let name = config.name.clone();
                self.insert_service(config)?;
                debug!("Reload added service '{}'", name);
                added += 1;
            }
        }
        info!("Reloaded registry, {} service(s) added", added);
        Ok(added)
    }

    /// Write the runtime snapshot (state, pid, restart count, auto_start
    /// per service) to `path`.
    pub async fn save_service_state<P: AsRef<Path>>(&self, path: P) -> ServiceResult<()> {
        let mut snapshots: Vec<ServiceSnapshot> = {
            let services = self.read_services();
            services
                .values()
                .map(|service| {
                    let status = service.status();
                    ServiceSnapshot {
                        name: service.name().to_string(),
                        state: status.state.code(),
                        pid: status.pid,
                        restart_count: status.restart_count,
                        auto_start: service.config().auto_start,
                    }
                })
                .collect()
        };
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));

        StateSnapshot::new(snapshots).save_to_file(path).await
    }

    /// Read a runtime snapshot and start the auto_start services it lists.
    /// Recorded PIDs are never trusted; start establishes fresh liveness.
    pub async fn restore_service_state<P: AsRef<Path>>(&self, path: P) -> ServiceResult<()> {
        let snapshot = StateSnapshot::load_from_file(path).await?;

        for entry in &snapshot.services {
            if !entry.auto_start {
                continue;
            }
            match self.service(&entry.name) {
                Ok(service) => {
                    if let Err(e) = service.start().await {
                        warn!("Restore could not start '{}': {}", entry.name, e);
                    }
                }
                Err(_) => {
                    warn!("Snapshot names unregistered service '{}'", entry.name);
                }
            }
        }
        Ok(())
    }

    /// Start the manager heartbeat: a periodic census of service states
    /// logged at debug level. Replaces any previous heartbeat.
    pub fn start_monitoring(&self, interval: Duration) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let services = Arc::downgrade(&self.services);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                let Some(services) = services.upgrade() else {
                    break;
                };
                let mut census: HashMap<ServiceState, usize> = HashMap::new();
                if let Ok(map) = services.read() {
                    for service in map.values() {
                        *census.entry(service.state()).or_insert(0) += 1;
                    }
                }
                debug!("Service census: {:?}", census);
            }
        });

        let mut slot = self
            .heartbeat
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        if let Some(old) = slot.take() {
            let _ = old.shutdown.send(true);
            old.task.abort();
        }
        *slot = Some(HeartbeatHandle {
            shutdown: shutdown_tx,
            task,
        });
    }

    /// Stop the heartbeat promptly.
    pub fn stop_monitoring(&self) {
        let handle = self
            .heartbeat
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.shutdown.send(true);
            drop(handle.task);
        }
    }

    /// Replace the status-change callback (single slot, last wins).
    pub fn set_status_change_callback(&self, callback: StatusCallback) {
        self.events.set_status_callback(callback);
    }

    /// Replace the error callback (single slot, last wins).
    pub fn set_error_callback(&self, callback: ErrorCallback) {
        self.events.set_error_callback(callback);
    }

    /// Orderly shutdown: stop the heartbeat, then every service.
    pub async fn shutdown(&self) -> ServiceResult<()> {
        info!("Shutting down service manager");
        self.stop_monitoring();
        self.stop_all_services().await
    }

    fn read_services(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Service>> {
        self.services.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_services(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Service>> {
        self.services.write().unwrap_or_else(|p| p.into_inner())
    }

    fn service(&self, name: &str) -> ServiceResult<Service> {
        self.read_services()
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(name))
    }

    fn config_snapshot(&self) -> Vec<ServiceConfig> {
        self.read_services()
            .values()
            .map(|s| s.config())
            .collect()
    }

    /// Create, wire, and insert a service without persisting the registry.
    fn insert_service(&self, config: ServiceConfig) -> ServiceResult<()> {
        config
            .validate()
            .map_err(|e| ServiceError::configuration(&config.name, e.to_string()))?;

        let mut services = self.write_services();
        if services.contains_key(&config.name) {
            return Err(ServiceError::already_exists(&config.name));
        }

        let name = config.name.clone();
        let service = Service::new(
            config,
            self.controller.clone(),
            self.events.clone(),
            self.sampler.clone(),
            self.monitor_interval,
        );

        // Weak reference: the probe must not keep the service map alive
        let map = Arc::downgrade(&self.services);
        service.set_dependency_probe(Arc::new(move |dependency: &str| {
            map.upgrade()
                .and_then(|services| {
                    services
                        .read()
                        .ok()
                        .map(|m| m.get(dependency).map(|s| s.is_running()).unwrap_or(false))
                })
                .unwrap_or(false)
        }));

        services.insert(name, service);
        Ok(())
    }

    /// Persist every registered config to the registry file.
    async fn save_registry(&self) -> ServiceResult<()> {
        let mut configs = self.config_snapshot();
        configs.sort_by(|a, b| a.name.cmp(&b.name));

        ServiceRegistry { services: configs }
            .save_to_file(&self.registry_path)
            .await
            .map_err(|e| ServiceError::persistence(e.to_string()))
    }
}

impl Drop for ServiceManager {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{wait_for_state, MockController};

    fn test_config(name: &str) -> ServiceConfig {
        let mut config = ServiceConfig::new(name, "/usr/bin/mock");
        config.restart_delay = Duration::from_millis(20);
        config.shutdown_timeout = Duration::from_millis(100);
        config
    }

    fn make_manager(dir: &tempfile::TempDir) -> (ServiceManager, Arc<MockController>) {
        let controller = Arc::new(MockController::new());
        let mut manager = ServiceManager::with_controller(
            dir.path().join("services.yaml"),
            controller.clone(),
        );
        manager.set_monitor_interval(Duration::from_millis(20));
        (manager, controller)
    }

    #[tokio::test]
    async fn test_register_and_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = make_manager(&dir);

        manager.register_service(test_config("web")).await.unwrap();
        let err = manager
            .register_service(test_config("web"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists { .. }));
        assert_eq!(manager.get_service_names(), vec!["web"]);
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = make_manager(&dir);

        let err = manager
            .register_service(test_config("bad name"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_unknown_status_is_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = make_manager(&dir);

        let status = manager.get_service_status("ghost");
        assert_eq!(status.state, ServiceState::Unknown);
        assert_eq!(status.pid, None);
        assert!(status.last_error.unwrap().contains("ghost"));
        assert!(!manager.is_service_running("ghost"));
    }

    #[tokio::test]
    async fn test_start_stop_service() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, controller) = make_manager(&dir);
        manager.register_service(test_config("web")).await.unwrap();

        manager.start_service("web").await.unwrap();
        assert!(manager.is_service_running("web"));
        let pid = manager.get_service_status("web").pid.unwrap();
        assert!(controller.is_alive(pid));

        manager.stop_service("web").await.unwrap();
        assert!(!manager.is_service_running("web"));
        assert!(!controller.is_alive(pid));
    }

    #[tokio::test]
    async fn test_start_unknown_service_errors() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = make_manager(&dir);
        assert!(matches!(
            manager.start_service("ghost").await.unwrap_err(),
            ServiceError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_start_all_respects_dependencies_and_priority() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, controller) = make_manager(&dir);

        let mut desktop = test_config("desktop");
        desktop.priority = crate::config::ServicePriority::Normal;
        desktop.dependencies = vec!["network".to_string(), "storage".to_string()];
        let mut storage = test_config("storage");
        storage.priority = crate::config::ServicePriority::High;
        storage.dependencies = vec!["network".to_string()];
        let mut network = test_config("network");
        network.priority = crate::config::ServicePriority::Critical;

        manager.register_service(desktop).await.unwrap();
        manager.register_service(storage).await.unwrap();
        manager.register_service(network).await.unwrap();

        manager.start_all_services().await.unwrap();
        assert_eq!(controller.spawn_names(), vec!["network", "storage", "desktop"]);
        assert!(manager.is_service_running("desktop"));
    }

    #[tokio::test]
    async fn test_start_all_skips_disabled_and_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, controller) = make_manager(&dir);

        let mut disabled = test_config("disabled");
        disabled.auto_start = false;
        manager.register_service(disabled).await.unwrap();
        manager.register_service(test_config("ok")).await.unwrap();

        controller.set_fail_spawn(false);
        manager.start_all_services().await.unwrap();
        assert_eq!(controller.spawn_names(), vec!["ok"]);
        assert_eq!(
            manager.get_service_status("disabled").state,
            ServiceState::Stopped
        );
    }

    #[tokio::test]
    async fn test_start_all_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, controller) = make_manager(&dir);

        // alpha starts first (name tiebreak) and fails; beta must still start
        manager.register_service(test_config("alpha")).await.unwrap();
        manager.register_service(test_config("beta")).await.unwrap();

        controller.set_die_on_spawn(true);
        // Only alpha's processes die: flip the flag from the error callback
        // would be racy, so instead fail everything and assert aggregation.
        let err = manager.start_all_services().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("alpha"));
        assert!(message.contains("beta"));
    }

    #[tokio::test]
    async fn test_stop_all_reverse_order() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = make_manager(&dir);

        let mut app = test_config("app");
        app.dependencies = vec!["db".to_string()];
        manager.register_service(app).await.unwrap();
        manager.register_service(test_config("db")).await.unwrap();

        manager.start_all_services().await.unwrap();
        manager.stop_all_services().await.unwrap();

        assert_eq!(manager.get_service_status("app").state, ServiceState::Stopped);
        assert_eq!(manager.get_service_status("db").state, ServiceState::Stopped);
    }

    #[tokio::test]
    async fn test_dependency_gate_on_manual_start() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = make_manager(&dir);

        let mut app = test_config("app");
        app.dependencies = vec!["db".to_string()];
        manager.register_service(app).await.unwrap();
        manager.register_service(test_config("db")).await.unwrap();

        let err = manager.start_service("app").await.unwrap_err();
        assert!(matches!(err, ServiceError::DependencyNotReady { .. }));

        manager.start_service("db").await.unwrap();
        manager.start_service("app").await.unwrap();
        assert!(manager.is_service_running("app"));
    }

    #[tokio::test]
    async fn test_unregister_stops_service() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, controller) = make_manager(&dir);
        manager.register_service(test_config("web")).await.unwrap();

        manager.start_service("web").await.unwrap();
        let pid = manager.get_service_status("web").pid.unwrap();

        manager.unregister_service("web").await.unwrap();
        assert!(!controller.is_alive(pid));
        assert!(manager.get_service_names().is_empty());
    }

    #[tokio::test]
    async fn test_unregister_keeps_service_when_stop_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, controller) = make_manager(&dir);
        manager.register_service(test_config("stuck")).await.unwrap();
        manager.start_service("stuck").await.unwrap();

        controller.set_fail_terminate(true);
        let err = manager.unregister_service("stuck").await.unwrap_err();
        assert!(matches!(err, ServiceError::StopFailed { .. }));
        assert_eq!(manager.get_service_names(), vec!["stuck"]);
    }

    #[tokio::test]
    async fn test_registry_persists_across_managers() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = make_manager(&dir);

        manager.register_service(test_config("web")).await.unwrap();
        manager.register_service(test_config("db")).await.unwrap();
        drop(manager);

        let (manager, _) = make_manager(&dir);
        manager.initialize().await.unwrap();
        assert_eq!(manager.get_service_names(), vec!["db", "web"]);
    }

    #[tokio::test]
    async fn test_initialize_installs_default_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = make_manager(&dir);

        manager.initialize().await.unwrap();
        assert_eq!(
            manager.get_service_names(),
            vec!["desktop", "network", "storage"]
        );
        // The catalog was persisted for the next run
        assert!(dir.path().join("services.yaml").exists());
        let config = manager.get_service_config("storage").unwrap();
        assert_eq!(config.dependencies, vec!["network"]);
    }

    #[tokio::test]
    async fn test_reload_is_additive() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = make_manager(&dir);
        manager.register_service(test_config("web")).await.unwrap();

        // Another manager adds a service to the same registry file
        let (other, _) = make_manager(&dir);
        other.initialize().await.unwrap();
        other.register_service(test_config("metrics")).await.unwrap();

        let added = manager.reload_config().await.unwrap();
        assert_eq!(added, 1);
        assert_eq!(manager.get_service_names(), vec!["metrics", "web"]);
    }

    #[tokio::test]
    async fn test_enable_disable_persists() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = make_manager(&dir);
        manager.register_service(test_config("web")).await.unwrap();

        manager.set_service_enabled("web", false).await.unwrap();
        assert!(!manager.get_service_config("web").unwrap().auto_start);

        let registry =
            ServiceRegistry::load_from_file(dir.path().join("services.yaml")).unwrap();
        assert!(!registry.services[0].auto_start);
    }

    #[tokio::test]
    async fn test_set_service_config() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = make_manager(&dir);
        manager.register_service(test_config("web")).await.unwrap();

        let mut updated = test_config("web");
        updated.max_restart_attempts = 7;
        manager.set_service_config("web", updated).await.unwrap();
        assert_eq!(
            manager.get_service_config("web").unwrap().max_restart_attempts,
            7
        );
    }

    #[tokio::test]
    async fn test_state_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let (manager, _) = make_manager(&dir);

        manager.register_service(test_config("web")).await.unwrap();
        let mut disabled = test_config("batch");
        disabled.auto_start = false;
        manager.register_service(disabled).await.unwrap();

        manager.start_service("web").await.unwrap();
        manager.save_service_state(&state_path).await.unwrap();
        manager.stop_all_services().await.unwrap();

        manager.restore_service_state(&state_path).await.unwrap();
        assert!(manager.is_service_running("web"));
        assert!(!manager.is_service_running("batch"));
    }

    #[tokio::test]
    async fn test_crash_recovery_through_manager() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, controller) = make_manager(&dir);
        manager.register_service(test_config("crashy")).await.unwrap();

        manager.start_service("crashy").await.unwrap();
        let pid = manager.get_service_status("crashy").pid.unwrap();
        controller.kill(pid);

        let service = manager.service("crashy").unwrap();
        wait_for_state(&service, ServiceState::Running, Duration::from_secs(2)).await;
        assert_ne!(manager.get_service_status("crashy").pid, Some(pid));
    }

    #[tokio::test]
    async fn test_manager_callbacks_fire() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, controller) = make_manager(&dir);
        manager.register_service(test_config("web")).await.unwrap();

        let errors = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = errors.clone();
        manager.set_error_callback(Arc::new(move |name, message| {
            sink.lock().unwrap().push((name.to_string(), message.to_string()));
        }));

        controller.set_fail_spawn(true);
        let _ = manager.start_service("web").await;

        let seen = errors.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "web");
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = make_manager(&dir);
        manager.register_service(test_config("web")).await.unwrap();
        manager.start_service("web").await.unwrap();
        manager.start_monitoring(Duration::from_millis(20));

        manager.shutdown().await.unwrap();
        assert_eq!(manager.get_service_status("web").state, ServiceState::Stopped);
    }
}
