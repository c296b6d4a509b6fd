//! Shared test helpers: a deterministic in-memory process controller and a
//! state polling helper.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use svc_common::{ServiceError, ServiceResult};

use crate::config::ServiceConfig;
use crate::controller::ProcessController;
use crate::service::Service;
use svc_state::ServiceState;

/// Fake controller: processes are entries in a set, killable at will.
pub struct MockController {
    alive: Mutex<HashSet<u32>>,
    next_pid: AtomicU32,
    spawns: AtomicU32,
    spawn_log: Mutex<Vec<String>>,
    fail_spawn: AtomicBool,
    die_on_spawn: AtomicBool,
    fail_terminate: AtomicBool,
}

impl MockController {
    pub fn new() -> Self {
        Self {
            alive: Mutex::new(HashSet::new()),
            next_pid: AtomicU32::new(1000),
            spawns: AtomicU32::new(0),
            spawn_log: Mutex::new(Vec::new()),
            fail_spawn: AtomicBool::new(false),
            die_on_spawn: AtomicBool::new(false),
            fail_terminate: AtomicBool::new(false),
        }
    }

    /// Simulate a crash of the given PID.
    pub fn kill(&self, pid: u32) {
        self.alive.lock().unwrap().remove(&pid);
    }

    pub fn spawn_count(&self) -> u32 {
        self.spawns.load(Ordering::SeqCst)
    }

    /// Service names in spawn order.
    pub fn spawn_names(&self) -> Vec<String> {
        self.spawn_log.lock().unwrap().clone()
    }

    /// Make spawn return an error.
    pub fn set_fail_spawn(&self, fail: bool) {
        self.fail_spawn.store(fail, Ordering::SeqCst);
    }

    /// Make spawned processes exit before the start grace recheck.
    pub fn set_die_on_spawn(&self, die: bool) {
        self.die_on_spawn.store(die, Ordering::SeqCst);
    }

    /// Make terminate fail as if the process survived SIGKILL.
    pub fn set_fail_terminate(&self, fail: bool) {
        self.fail_terminate.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProcessController for MockController {
    async fn spawn(&self, name: &str, _config: &ServiceConfig) -> ServiceResult<u32> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(ServiceError::spawn_failed(name, "mock spawn failure"));
        }
        self.spawns.fetch_add(1, Ordering::SeqCst);
        self.spawn_log.lock().unwrap().push(name.to_string());
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        if !self.die_on_spawn.load(Ordering::SeqCst) {
            self.alive.lock().unwrap().insert(pid);
        }
        Ok(pid)
    }

    async fn terminate(
        &self,
        name: &str,
        pid: u32,
        _graceful_timeout: Duration,
    ) -> ServiceResult<()> {
        if self.fail_terminate.load(Ordering::SeqCst) {
            return Err(ServiceError::stop_failed(
                name,
                format!("process {} survived SIGKILL", pid),
            ));
        }
        self.alive.lock().unwrap().remove(&pid);
        Ok(())
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }
}

/// Poll until the service reaches `expected` or the timeout passes.
/// Panics on timeout so failing tests name the state they were waiting for.
pub async fn wait_for_state(service: &Service, expected: ServiceState, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if service.state() == expected {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!(
                "service '{}' did not reach {:?} within {:?} (currently {:?})",
                service.name(),
                expected,
                timeout,
                service.state()
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
