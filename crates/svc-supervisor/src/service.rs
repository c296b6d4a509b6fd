//! One supervised service: lifecycle operations and the monitor loop.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use chrono::Utc;
use svc_common::{ServiceError, ServiceResult};
use svc_state::{ServiceState, ServiceStateMachine};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ServiceConfig;
use crate::controller::ProcessController;
use crate::events::EventSinks;
use crate::resources::ResourceSampler;
use crate::status::ServiceStatus;

/// Grace period after spawn before the liveness recheck.
const START_GRACE: Duration = Duration::from_millis(100);

/// Default monitor loop tick.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Probe injected by the manager: is the named dependency Running?
pub type DependencyProbe = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// State machine and status, updated together under one lock.
struct Runtime {
    machine: ServiceStateMachine,
    status: ServiceStatus,
}

struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct ServiceInner {
    name: String,
    config: RwLock<ServiceConfig>,
    runtime: Mutex<Runtime>,
    /// Serializes start/stop/restart and the monitor's respawns.
    op_lock: tokio::sync::Mutex<()>,
    controller: Arc<dyn ProcessController>,
    events: Arc<EventSinks>,
    sampler: Arc<ResourceSampler>,
    dependency_probe: RwLock<Option<DependencyProbe>>,
    monitor: Mutex<Option<MonitorHandle>>,
    monitor_interval: Duration,
}

/// Cloneable handle to one supervised service.
#[derive(Clone)]
pub struct Service {
    inner: Arc<ServiceInner>,
}

/// Recover from a poisoned std mutex; supervisor state stays usable even
/// if a callback panicked on some thread.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ServiceInner {
    /// Apply a state transition and fire the status callback outside the lock.
    fn set_state(&self, target: ServiceState, reason: impl Into<String>) -> ServiceResult<()> {
        let (old, new) = {
            let mut runtime = lock(&self.runtime);
            let old = runtime.machine.current_state();
            runtime.machine.transition_to(target, Some(reason.into()))?;
            runtime.status.state = runtime.machine.current_state();
            (old, runtime.machine.current_state())
        };
        if old != new {
            self.events.notify_status(&self.name, old, new);
        }
        Ok(())
    }

    fn current_state(&self) -> ServiceState {
        lock(&self.runtime).machine.current_state()
    }

    /// Transition to Failed, record the error, clear the pid, fire callbacks.
    /// One critical section, so no snapshot can see Failed with a pid or a
    /// live state with the pid already cleared.
    fn mark_failed(&self, reason: &str) {
        let (old, new) = {
            let mut runtime = lock(&self.runtime);
            let old = runtime.machine.current_state();
            if let Err(e) = runtime
                .machine
                .transition_to(ServiceState::Failed, Some(reason.to_string()))
            {
                warn!("Service '{}': could not record failure: {}", self.name, e);
            }
            runtime.status.state = runtime.machine.current_state();
            runtime.status.last_error = Some(reason.to_string());
            runtime.status.pid = None;
            (old, runtime.machine.current_state())
        };
        if old != new {
            self.events.notify_status(&self.name, old, new);
        }
        self.events.notify_error(&self.name, reason);
    }

    fn restart_budget(&self) -> (u32, u32, Duration) {
        let (max, delay) = {
            let config = self.config.read().unwrap_or_else(|p| p.into_inner());
            (config.max_restart_attempts, config.restart_delay)
        };
        let count = lock(&self.runtime).status.restart_count;
        (count, max, delay)
    }
}

impl Service {
    pub fn new(
        config: ServiceConfig,
        controller: Arc<dyn ProcessController>,
        events: Arc<EventSinks>,
        sampler: Arc<ResourceSampler>,
        monitor_interval: Duration,
    ) -> Self {
        let name = config.name.clone();
        Self {
            inner: Arc::new(ServiceInner {
                runtime: Mutex::new(Runtime {
                    machine: ServiceStateMachine::new(&name),
                    status: ServiceStatus::new(),
                }),
                config: RwLock::new(config),
                op_lock: tokio::sync::Mutex::new(()),
                controller,
                events,
                sampler,
                dependency_probe: RwLock::new(None),
                monitor: Mutex::new(None),
                monitor_interval,
                name,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> ServiceState {
        self.inner.current_state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServiceState::Running
    }

    /// Point-in-time status snapshot.
    pub fn status(&self) -> ServiceStatus {
        lock(&self.inner.runtime).status.clone()
    }

    pub fn config(&self) -> ServiceConfig {
        self.inner
            .config
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Replace the configuration. Takes effect on the next start.
    pub fn set_config(&self, config: ServiceConfig) -> ServiceResult<()> {
        config
            .validate()
            .map_err(|e| ServiceError::configuration(&self.inner.name, e.to_string()))?;
        if config.name != self.inner.name {
            return Err(ServiceError::configuration(
                &self.inner.name,
                format!("cannot rename service to '{}'", config.name),
            ));
        }
        let mut slot = self
            .inner
            .config
            .write()
            .unwrap_or_else(|p| p.into_inner());
        *slot = config;
        Ok(())
    }

    /// Install the dependency readiness probe (set by the manager).
    pub fn set_dependency_probe(&self, probe: DependencyProbe) {
        let mut slot = self
            .inner
            .dependency_probe
            .write()
            .unwrap_or_else(|p| p.into_inner());
        *slot = Some(probe);
    }

    /// Start the service.
    ///
    /// Idempotent while Running or Starting. Refuses to launch when a
    /// declared dependency is not Running. On success the process has
    /// survived the start grace period and the monitor loop is active.
    pub async fn start(&self) -> ServiceResult<()> {
        let _guard = self.inner.op_lock.lock().await;

        let state = self.inner.current_state();
        if matches!(state, ServiceState::Running | ServiceState::Starting) {
            debug!("Service '{}' already {}", self.inner.name, state);
            return Ok(());
        }

        self.check_dependencies()?;
        spawn_supervised(&self.inner).await?;
        start_monitor(&self.inner);
        info!("Service '{}' started", self.inner.name);
        Ok(())
    }

    fn check_dependencies(&self) -> ServiceResult<()> {
        let dependencies = {
            let config = self
                .inner
                .config
                .read()
                .unwrap_or_else(|p| p.into_inner());
            config.dependencies.clone()
        };
        if dependencies.is_empty() {
            return Ok(());
        }

        let probe = {
            let slot = self
                .inner
                .dependency_probe
                .read()
                .unwrap_or_else(|p| p.into_inner());
            slot.clone()
        };
        let Some(probe) = probe else {
            // Standalone service with declared dependencies but no manager;
            // nothing to probe against.
            return Ok(());
        };

        for dependency in &dependencies {
            if !probe(dependency) {
                let reason = format!("dependency not ready: {}", dependency);
                self.inner.mark_failed(&reason);
                return Err(ServiceError::dependency_not_ready(
                    &self.inner.name,
                    dependency,
                ));
            }
        }
        Ok(())
    }

    /// Stop the service.
    ///
    /// Idempotent while Stopped or Stopping. A Failed service with no live
    /// process is forced to Stopped without signaling anything. A process
    /// that survives the kill escalation leaves the service Failed and the
    /// error propagates.
    pub async fn stop(&self) -> ServiceResult<()> {
        let _guard = self.inner.op_lock.lock().await;

        let state = self.inner.current_state();
        if matches!(state, ServiceState::Stopped | ServiceState::Stopping) {
            debug!("Service '{}' already {}", self.inner.name, state);
            return Ok(());
        }

        stop_monitor(&self.inner);

        let pid = lock(&self.inner.runtime).status.pid;
        let Some(pid) = pid else {
            self.inner
                .set_state(ServiceState::Stopped, "stopped with no live process")?;
            lock(&self.inner.runtime).status.start_time = None;
            info!("Service '{}' stopped (no process)", self.inner.name);
            return Ok(());
        };

        self.inner
            .set_state(ServiceState::Stopping, "stop requested")?;

        let timeout = {
            let config = self
                .inner
                .config
                .read()
                .unwrap_or_else(|p| p.into_inner());
            config.shutdown_timeout
        };

        match self
            .inner
            .controller
            .terminate(&self.inner.name, pid, timeout)
            .await
        {
            Ok(()) => {
                {
                    let mut runtime = lock(&self.inner.runtime);
                    runtime.status.pid = None;
                    runtime.status.start_time = None;
                }
                self.inner
                    .set_state(ServiceState::Stopped, "process terminated")?;
                info!("Service '{}' stopped", self.inner.name);
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                lock(&self.inner.runtime).status.last_error = Some(reason.clone());
                if let Err(se) = self.inner.set_state(ServiceState::Failed, &reason) {
                    warn!("Service '{}': {}", self.inner.name, se);
                }
                self.inner.events.notify_error(&self.inner.name, &reason);
                error!("Service '{}' failed to stop: {}", self.inner.name, reason);
                Err(e)
            }
        }
    }

    /// Stop, wait the restart delay, start again.
    pub async fn restart(&self) -> ServiceResult<()> {
        info!("Restarting service '{}'", self.inner.name);
        self.stop().await?;

        let delay = {
            let config = self
                .inner
                .config
                .read()
                .unwrap_or_else(|p| p.into_inner());
            config.restart_delay
        };
        tokio::time::sleep(delay).await;

        self.start().await
    }
}

/// Spawn sequence shared by `start` and the monitor's automatic respawn.
/// Caller holds the op lock.
async fn spawn_supervised(inner: &Arc<ServiceInner>) -> ServiceResult<()> {
    let config = inner
        .config
        .read()
        .unwrap_or_else(|p| p.into_inner())
        .clone();

    inner.set_state(ServiceState::Starting, "start requested")?;
    {
        let mut runtime = lock(&inner.runtime);
        runtime.status.last_error = None;
        // Every spawn attempt counts against the restart budget
        runtime.status.restart_count += 1;
    }

    let pid = match inner.controller.spawn(&inner.name, &config).await {
        Ok(pid) => pid,
        Err(e) => {
            inner.mark_failed(&e.to_string());
            return Err(e);
        }
    };

    {
        let mut runtime = lock(&inner.runtime);
        let now = Utc::now();
        runtime.status.pid = Some(pid);
        runtime.status.start_time = Some(now);
        runtime.status.last_activity = Some(now);
    }

    // Entry failures that slip past exec (bad flags, missing libraries)
    // show up as an immediate exit.
    tokio::time::sleep(START_GRACE).await;

    if !inner.controller.is_alive(pid) {
        let reason = "process exited immediately after start";
        inner.mark_failed(reason);
        return Err(ServiceError::start_failed(&inner.name, reason));
    }

    inner.set_state(ServiceState::Running, "process is alive after start grace")?;
    Ok(())
}

/// Launch the monitor loop task, replacing any previous one.
fn start_monitor(inner: &Arc<ServiceInner>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(monitor_loop(inner.clone(), shutdown_rx));

    let mut slot = lock(&inner.monitor);
    if let Some(old) = slot.take() {
        let _ = old.shutdown.send(true);
        old.task.abort();
    }
    *slot = Some(MonitorHandle {
        shutdown: shutdown_tx,
        task,
    });
}

/// Signal the monitor loop to exit promptly.
fn stop_monitor(inner: &Arc<ServiceInner>) {
    let handle = lock(&inner.monitor).take();
    if let Some(handle) = handle {
        let _ = handle.shutdown.send(true);
        // The loop exits at its next await; no join needed.
        drop(handle.task);
    }
}

/// Periodic liveness and resource check, plus bounded automatic restart.
async fn monitor_loop(inner: Arc<ServiceInner>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(inner.monitor_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; skip it so a freshly started
    // process is not probed twice in a row.
    interval.tick().await;

    debug!("Monitor loop started for service '{}'", inner.name);

    'monitor: loop {
        tokio::select! {
            _ = shutdown.changed() => break 'monitor,
            _ = interval.tick() => {}
        }

        let pid = lock(&inner.runtime).status.pid;
        let Some(pid) = pid else {
            // Stop path clears the pid before signaling; nothing to probe.
            continue;
        };

        if inner.controller.is_alive(pid) {
            let usage = inner.sampler.sample(pid);
            let mut runtime = lock(&inner.runtime);
            runtime.status.last_activity = Some(Utc::now());
            if let Some(usage) = usage {
                runtime.status.memory_usage = Some(usage.memory_bytes);
                runtime.status.cpu_usage = Some(usage.cpu_percent);
            }
            continue;
        }

        warn!(
            "Service '{}': process {} exited unexpectedly",
            inner.name, pid
        );
        inner.mark_failed("process exited unexpectedly");

        // Bounded automatic restart
        'respawn: loop {
            let (count, max, delay) = inner.restart_budget();
            if count >= max {
                error!(
                    "Service '{}': restart budget exhausted ({} attempts), leaving failed",
                    inner.name, count
                );
                break 'monitor;
            }

            info!(
                "Service '{}': restarting in {:?} (attempt {} of {})",
                inner.name,
                delay,
                count + 1,
                max
            );
            tokio::select! {
                _ = shutdown.changed() => break 'monitor,
                _ = tokio::time::sleep(delay) => {}
            }

            let guard = tokio::select! {
                guard = inner.op_lock.lock() => guard,
                _ = shutdown.changed() => break 'monitor,
            };

            // A concurrent stop or manual start may have intervened.
            if *shutdown.borrow() || inner.current_state() != ServiceState::Failed {
                drop(guard);
                break 'monitor;
            }

            match spawn_supervised(&inner).await {
                Ok(()) => {
                    drop(guard);
                    info!("Service '{}' restarted automatically", inner.name);
                    continue 'monitor;
                }
                Err(e) => {
                    drop(guard);
                    warn!("Service '{}': automatic restart failed: {}", inner.name, e);
                    continue 'respawn;
                }
            }
        }
    }

    debug!("Monitor loop exited for service '{}'", inner.name);
}
