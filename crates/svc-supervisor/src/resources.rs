//! Per-process resource sampling.

use std::sync::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, System};
use tracing::trace;

/// Memory and CPU figures for one process.
#[derive(Debug, Clone, Copy)]
pub struct ResourceUsage {
    pub memory_bytes: u64,
    pub cpu_percent: f32,
}

/// Samples resource usage for monitored PIDs.
///
/// Holds one `System` behind a mutex; refreshes are scoped to the single
/// PID being sampled, otherwise sysinfo returns stale data.
pub struct ResourceSampler {
    system: Mutex<System>,
}

impl ResourceSampler {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    /// Sample a PID. Returns `None` when the process is gone or the
    /// sampler lock is poisoned.
    pub fn sample(&self, pid: u32) -> Option<ResourceUsage> {
        let mut system = self.system.lock().ok()?;

        let sysinfo_pid = Pid::from_u32(pid);
        system.refresh_process_specifics(
            sysinfo_pid,
            ProcessRefreshKind::new().with_memory().with_cpu(),
        );

        let process = system.process(sysinfo_pid)?;
        let usage = ResourceUsage {
            memory_bytes: process.memory(),
            cpu_percent: process.cpu_usage(),
        };
        trace!(
            "PID {}: {} bytes RSS, {:.1}% CPU",
            pid,
            usage.memory_bytes,
            usage.cpu_percent
        );
        Some(usage)
    }
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_current_process() {
        let sampler = ResourceSampler::new();
        let usage = sampler.sample(std::process::id());
        // Memory should be observable for our own process
        assert!(usage.is_some());
        assert!(usage.unwrap().memory_bytes > 0);
    }

    #[test]
    fn test_sample_missing_process() {
        let sampler = ResourceSampler::new();
        assert!(sampler.sample(9999999).is_none());
    }
}
