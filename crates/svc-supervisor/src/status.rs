//! Runtime status of a service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use svc_state::ServiceState;

/// Point-in-time view of one service.
///
/// `pid` is `Some` only while a process is believed alive. `restart_count`
/// counts every spawn attempt since registration and is never reset by a
/// stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub state: ServiceState,
    pub pid: Option<u32>,
    pub start_time: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub restart_count: u32,
    pub last_error: Option<String>,
    /// Resident memory in bytes, refreshed by the monitor loop
    pub memory_usage: Option<u64>,
    /// CPU percentage, refreshed by the monitor loop
    pub cpu_usage: Option<f32>,
}

impl ServiceStatus {
    /// Fresh status for a newly registered service.
    pub fn new() -> Self {
        Self {
            state: ServiceState::Stopped,
            pid: None,
            start_time: None,
            last_activity: None,
            restart_count: 0,
            last_error: None,
            memory_usage: None,
            cpu_usage: None,
        }
    }

    /// Sentinel returned for queries about unregistered services.
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self {
            state: ServiceState::Unknown,
            last_error: Some(reason.into()),
            ..Self::new()
        }
    }
}

impl Default for ServiceStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_status() {
        let status = ServiceStatus::new();
        assert_eq!(status.state, ServiceState::Stopped);
        assert_eq!(status.pid, None);
        assert_eq!(status.restart_count, 0);
        assert!(status.last_error.is_none());
    }

    #[test]
    fn test_unknown_sentinel() {
        let status = ServiceStatus::unknown("service not found: ghost");
        assert_eq!(status.state, ServiceState::Unknown);
        assert_eq!(status.pid, None);
        assert_eq!(status.last_error.as_deref(), Some("service not found: ghost"));
    }
}
