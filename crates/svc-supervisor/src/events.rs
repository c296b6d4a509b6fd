//! Status and error event hooks.
//!
//! One slot per event kind, shared by every service the manager owns; the
//! most recent registration wins. Callbacks are invoked with no supervisor
//! locks held and must not call back into the manager.

use std::sync::{Arc, RwLock};
use svc_state::ServiceState;
use tracing::debug;

/// Invoked as `(service_name, old_state, new_state)`.
pub type StatusCallback = Arc<dyn Fn(&str, ServiceState, ServiceState) + Send + Sync>;

/// Invoked as `(service_name, error_message)`.
pub type ErrorCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Shared callback slots.
#[derive(Default)]
pub struct EventSinks {
    status: RwLock<Option<StatusCallback>>,
    error: RwLock<Option<ErrorCallback>>,
}

impl EventSinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the status-change callback (last registration wins).
    pub fn set_status_callback(&self, callback: StatusCallback) {
        if let Ok(mut slot) = self.status.write() {
            *slot = Some(callback);
        }
    }

    /// Replace the error callback (last registration wins).
    pub fn set_error_callback(&self, callback: ErrorCallback) {
        if let Ok(mut slot) = self.error.write() {
            *slot = Some(callback);
        }
    }

    pub fn notify_status(&self, name: &str, old_state: ServiceState, new_state: ServiceState) {
        let callback = self
            .status
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().cloned());
        if let Some(callback) = callback {
            debug!("Status callback: {} {} -> {}", name, old_state, new_state);
            callback(name, old_state, new_state);
        }
    }

    pub fn notify_error(&self, name: &str, message: &str) {
        let callback = self
            .error
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().cloned());
        if let Some(callback) = callback {
            debug!("Error callback: {}: {}", name, message);
            callback(name, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_last_registration_wins() {
        let sinks = EventSinks::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        sinks.set_error_callback(Arc::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let counter = second.clone();
        sinks.set_error_callback(Arc::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        sinks.notify_error("svc", "boom");
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_notify_without_callback_is_noop() {
        let sinks = EventSinks::new();
        sinks.notify_status("svc", ServiceState::Stopped, ServiceState::Starting);
        sinks.notify_error("svc", "ignored");
    }

    #[test]
    fn test_status_callback_receives_states() {
        let sinks = EventSinks::new();
        let seen = Arc::new(RwLock::new(Vec::new()));
        let sink = seen.clone();
        sinks.set_status_callback(Arc::new(move |name, old, new| {
            sink.write().unwrap().push((name.to_string(), old, new));
        }));

        sinks.notify_status("web", ServiceState::Starting, ServiceState::Running);
        let events = seen.read().unwrap();
        assert_eq!(
            events[0],
            (
                "web".to_string(),
                ServiceState::Starting,
                ServiceState::Running
            )
        );
    }
}
