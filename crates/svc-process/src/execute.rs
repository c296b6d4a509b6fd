//! Process spawning.
//!
//! Builds a `tokio::process::Command` from a [`CommandSpec`] and spawns it.
//! Entry failures (missing executable, bad working directory) surface here;
//! crashes after a successful exec are the caller's monitoring problem.

use std::collections::HashMap;
use std::path::Path;

use svc_common::{ServiceError, ServiceResult};
use tokio::process::{Child, Command};
use tracing::debug;

/// Everything needed to launch one process.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub executable_path: String,
    pub args: Vec<String>,
    pub working_directory: Option<String>,
    /// Appended to the inherited environment; later entries win.
    pub environment: HashMap<String, String>,
}

impl CommandSpec {
    pub fn new(executable_path: impl Into<String>) -> Self {
        Self {
            executable_path: executable_path.into(),
            ..Default::default()
        }
    }
}

/// Spawn a process described by `spec`, identified by `name` in errors.
///
/// The returned [`Child`] owns the OS handle; the caller must eventually
/// `wait()` on it or the process becomes a zombie on Unix.
pub fn spawn_process(name: &str, spec: &CommandSpec) -> ServiceResult<Child> {
    if spec.executable_path.is_empty() {
        return Err(ServiceError::spawn_failed(name, "executable path is empty"));
    }

    if let Some(dir) = &spec.working_directory {
        if !Path::new(dir).is_dir() {
            return Err(ServiceError::spawn_failed(
                name,
                format!("working directory does not exist: {}", dir),
            ));
        }
    }

    let mut command = Command::new(&spec.executable_path);
    command.args(&spec.args);

    if let Some(dir) = &spec.working_directory {
        command.current_dir(dir);
    }

    for (key, value) in &spec.environment {
        command.env(key, value);
    }

    command.kill_on_drop(false);

    debug!(
        executable = %spec.executable_path,
        args = ?spec.args,
        "Spawning process for '{}'", name
    );

    command.spawn().map_err(|e| {
        let reason = match e.kind() {
            std::io::ErrorKind::NotFound => {
                format!("executable not found: {}", spec.executable_path)
            }
            std::io::ErrorKind::PermissionDenied => {
                format!("permission denied: {}", spec.executable_path)
            }
            _ => e.to_string(),
        };
        ServiceError::spawn_failed(name, reason)
    })
}
