//! Runtime state snapshot.
//!
//! A JSON file recording, per service, the last observed state, PID,
//! restart count, and the auto_start flag. Restore never trusts a recorded
//! PID; it only uses `auto_start` to decide what to launch, and a fresh
//! start establishes fresh liveness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use svc_common::{ServiceError, ServiceResult};
use svc_state::ServiceState;
use tracing::debug;

/// One service's recorded runtime state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub name: String,
    /// Numeric state code, see [`ServiceState::code`]
    pub state: u8,
    pub pid: Option<u32>,
    pub restart_count: u32,
    pub auto_start: bool,
}

impl ServiceSnapshot {
    pub fn state(&self) -> ServiceState {
        ServiceState::from_code(self.state)
    }
}

/// The whole snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub saved_at: DateTime<Utc>,
    pub services: Vec<ServiceSnapshot>,
}

impl StateSnapshot {
    pub fn new(services: Vec<ServiceSnapshot>) -> Self {
        Self {
            saved_at: Utc::now(),
            services,
        }
    }

    /// Write the snapshot atomically (temp file, then rename).
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ServiceResult<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ServiceError::persistence(format!("serialize snapshot: {}", e)))?;

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content).await.map_err(|e| {
            ServiceError::persistence(format!("write {}: {}", temp_path.display(), e))
        })?;
        tokio::fs::rename(&temp_path, path).await.map_err(|e| {
            ServiceError::persistence(format!("rename into {}: {}", path.display(), e))
        })?;

        debug!(
            "Saved state snapshot ({} service(s)) to {}",
            self.services.len(),
            path.display()
        );
        Ok(())
    }

    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> ServiceResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ServiceError::persistence(format!("read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| ServiceError::persistence(format!("parse {}: {}", path.display(), e)))
    }
}
