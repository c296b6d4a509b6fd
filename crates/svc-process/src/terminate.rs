//! Process termination primitives.
//!
//! Graceful termination asks the process to exit; forced termination does
//! not. The escalation policy between the two lives in the supervisor, not
//! here.

use svc_common::ServiceResult;

/// Ask a process to terminate (SIGTERM on Unix).
///
/// Windows has no SIGTERM analogue for arbitrary processes, so the graceful
/// path falls through to `TerminateProcess` there.
pub fn terminate_gracefully(pid: u32) -> ServiceResult<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let nix_pid = Pid::from_raw(pid as i32);
        kill(nix_pid, Signal::SIGTERM)
            .map_err(|e| svc_common::ServiceError::stop_failed(pid.to_string(), e.to_string()))
    }

    #[cfg(windows)]
    {
        force_kill(pid)
    }
}

/// Force kill a process (SIGKILL on Unix, TerminateProcess on Windows).
pub fn force_kill(pid: u32) -> ServiceResult<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let nix_pid = Pid::from_raw(pid as i32);
        kill(nix_pid, Signal::SIGKILL)
            .map_err(|e| svc_common::ServiceError::stop_failed(pid.to_string(), e.to_string()))
    }

    #[cfg(windows)]
    {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

        unsafe {
            let handle = match OpenProcess(PROCESS_TERMINATE, false, pid) {
                Ok(h) if !h.is_invalid() => h,
                _ => {
                    return Err(svc_common::ServiceError::stop_failed(
                        pid.to_string(),
                        "Failed to open process for termination".to_string(),
                    ));
                }
            };

            let result = TerminateProcess(handle, 1);
            let _ = CloseHandle(handle);

            result.map_err(|e| {
                svc_common::ServiceError::stop_failed(
                    pid.to_string(),
                    format!("TerminateProcess failed: {}", e),
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::process_exists;

    #[tokio::test]
    #[cfg(unix)]
    async fn test_force_kill_child() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        assert!(process_exists(pid).unwrap());
        force_kill(pid).unwrap();

        // Reap the child so the PID actually disappears.
        let status = child.wait().await.unwrap();
        assert!(!status.success());
        assert!(!process_exists(pid).unwrap());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_terminate_gracefully_child() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        terminate_gracefully(pid).unwrap();
        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }

    #[test]
    #[cfg(unix)]
    fn test_terminate_nonexistent_pid_fails() {
        let unlikely_pid = 9999999;
        if !process_exists(unlikely_pid).unwrap() {
            assert!(terminate_gracefully(unlikely_pid).is_err());
        }
    }
}
