//! Process control seam.
//!
//! [`ProcessController`] is the narrow interface the supervisor uses to
//! touch OS processes. [`OsProcessController`] is the production
//! implementation; tests substitute a mock to exercise lifecycle logic
//! deterministically.

use std::time::Duration;

use async_trait::async_trait;
use svc_common::{ServiceError, ServiceResult};
use svc_process::{force_kill, process_exists, spawn_process, terminate_gracefully, CommandSpec};
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;

/// Upper bound on waiting for a process to die after SIGKILL.
const FORCE_KILL_TIMEOUT: Duration = Duration::from_secs(3);

/// Polling interval while waiting for a terminated process to exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Low-level process operations used by [`crate::Service`].
#[async_trait]
pub trait ProcessController: Send + Sync {
    /// Launch the service's process and return its PID.
    ///
    /// Entry failures (missing executable, bad working directory) are
    /// reported here; a process that crashes after exec is caught later by
    /// the start grace recheck or the monitor loop.
    async fn spawn(&self, name: &str, config: &ServiceConfig) -> ServiceResult<u32>;

    /// Terminate a process: graceful signal, wait up to `graceful_timeout`,
    /// escalate to a forced kill, confirm exit.
    ///
    /// A process that survives the forced kill is a hard error.
    async fn terminate(&self, name: &str, pid: u32, graceful_timeout: Duration)
        -> ServiceResult<()>;

    /// Non-destructive liveness probe.
    fn is_alive(&self, pid: u32) -> bool;
}

/// Production controller backed by real OS processes.
#[derive(Debug, Default)]
pub struct OsProcessController;

/// True only for a confirmed exit. A probe error must not pass for
/// "process gone": that would report successful termination of a possibly
/// live process.
fn confirmed_gone(probe: &ServiceResult<bool>) -> bool {
    matches!(probe, Ok(false))
}

impl OsProcessController {
    pub fn new() -> Self {
        Self
    }

    /// Poll until the process is confirmed gone or the deadline passes.
    /// Probe errors are logged and polling continues.
    async fn wait_for_exit(&self, pid: u32, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let probe = process_exists(pid);
            if let Err(e) = &probe {
                warn!("Liveness probe for PID {} failed: {}", pid, e);
            }
            if confirmed_gone(&probe) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl ProcessController for OsProcessController {
    async fn spawn(&self, name: &str, config: &ServiceConfig) -> ServiceResult<u32> {
        let spec = CommandSpec {
            executable_path: config.executable_path.clone(),
            args: config.args.clone(),
            working_directory: config.working_directory.clone(),
            environment: config.environment.clone(),
        };

        let mut child = spawn_process(name, &spec)?;
        let pid = child
            .id()
            .ok_or_else(|| ServiceError::spawn_failed(name, "process exited before PID capture"))?;

        info!("Spawned process for service '{}' with PID {}", name, pid);

        // The reaper owns the Child: awaiting wait() collects the exit
        // status so no zombie is left behind. Exit handling itself is the
        // monitor loop's job.
        let reaper_name = name.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    debug!(
                        "Process for service '{}' (PID {}) exited with {}",
                        reaper_name, pid, status
                    );
                }
                Err(e) => {
                    warn!(
                        "Failed to reap process for service '{}' (PID {}): {}",
                        reaper_name, pid, e
                    );
                }
            }
        });

        Ok(pid)
    }

    async fn terminate(
        &self,
        name: &str,
        pid: u32,
        graceful_timeout: Duration,
    ) -> ServiceResult<()> {
        let probe = process_exists(pid);
        if confirmed_gone(&probe) {
            debug!("Process {} for service '{}' already gone", pid, name);
            return Ok(());
        }
        if let Err(e) = &probe {
            warn!(
                "Liveness probe for PID {} failed ({}), proceeding with termination",
                pid, e
            );
        }

        debug!(
            "Terminating process {} for service '{}' (grace {:?})",
            pid, name, graceful_timeout
        );
        if let Err(e) = terminate_gracefully(pid) {
            // The process may have exited between the probe and the signal.
            if confirmed_gone(&process_exists(pid)) {
                return Ok(());
            }
            return Err(e);
        }

        if self.wait_for_exit(pid, graceful_timeout).await {
            info!("Process {} for service '{}' exited gracefully", pid, name);
            return Ok(());
        }

        warn!(
            "Process {} for service '{}' did not exit within {:?}, force killing",
            pid, name, graceful_timeout
        );
        force_kill(pid)?;

        if self.wait_for_exit(pid, FORCE_KILL_TIMEOUT).await {
            info!("Process {} for service '{}' force killed", pid, name);
            Ok(())
        } else {
            Err(ServiceError::stop_failed(
                name,
                format!("process {} survived SIGKILL", pid),
            ))
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        match process_exists(pid) {
            Ok(alive) => alive,
            Err(e) => {
                // Assume alive: a failed check must not look like an exit
                // to the monitor loop.
                warn!("Liveness probe for PID {} failed: {}", pid, e);
                true
            }
        }
    }
}
