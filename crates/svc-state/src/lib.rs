use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use svc_common::{ServiceError, ServiceResult};

/// Service lifecycle states.
///
/// `Unknown` is a query sentinel for services that are not registered; it
/// is never a valid transition target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceState {
    /// Service is not running
    Stopped,
    /// Service launch is in progress
    Starting,
    /// Service process is alive and monitored
    Running,
    /// Service shutdown is in progress
    Stopping,
    /// Service process failed or exited unexpectedly
    Failed,
    /// Sentinel for queries about unregistered services
    Unknown,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Stopped => write!(f, "stopped"),
            ServiceState::Starting => write!(f, "starting"),
            ServiceState::Running => write!(f, "running"),
            ServiceState::Stopping => write!(f, "stopping"),
            ServiceState::Failed => write!(f, "failed"),
            ServiceState::Unknown => write!(f, "unknown"),
        }
    }
}

impl ServiceState {
    /// Check if the service is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceState::Stopped | ServiceState::Failed)
    }

    /// Check if the service is in a transitional state
    pub fn is_transitional(&self) -> bool {
        matches!(self, ServiceState::Starting | ServiceState::Stopping)
    }

    /// Check if a process may be associated with this state
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ServiceState::Starting | ServiceState::Running | ServiceState::Stopping
        )
    }

    /// Stable numeric code, used by the runtime snapshot file.
    pub fn code(&self) -> u8 {
        match self {
            ServiceState::Stopped => 0,
            ServiceState::Starting => 1,
            ServiceState::Running => 2,
            ServiceState::Stopping => 3,
            ServiceState::Failed => 4,
            ServiceState::Unknown => 5,
        }
    }

    /// Inverse of [`code`](Self::code). Unrecognized codes map to `Unknown`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ServiceState::Stopped,
            1 => ServiceState::Starting,
            2 => ServiceState::Running,
            3 => ServiceState::Stopping,
            4 => ServiceState::Failed,
            _ => ServiceState::Unknown,
        }
    }
}

/// One recorded transition with timestamp and optional reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: ServiceState,
    pub to_state: ServiceState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

const MAX_HISTORY: usize = 100;

/// State machine guarding a service's lifecycle transitions.
#[derive(Debug, Clone)]
pub struct ServiceStateMachine {
    service_name: String,
    current_state: ServiceState,
    previous_state: Option<ServiceState>,
    state_history: Vec<StateTransition>,
    last_transition_time: DateTime<Utc>,
}

impl ServiceStateMachine {
    /// Create a new state machine; services begin life Stopped.
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            current_state: ServiceState::Stopped,
            previous_state: None,
            state_history: Vec::new(),
            last_transition_time: Utc::now(),
        }
    }

    pub fn current_state(&self) -> ServiceState {
        self.current_state
    }

    pub fn previous_state(&self) -> Option<ServiceState> {
        self.previous_state
    }

    pub fn state_history(&self) -> &[StateTransition] {
        &self.state_history
    }

    pub fn last_transition_time(&self) -> DateTime<Utc> {
        self.last_transition_time
    }

    /// Check if a transition from the current state to `target_state` is valid.
    pub fn is_valid_transition(&self, target_state: ServiceState) -> bool {
        match (self.current_state, target_state) {
            // Unknown is a sentinel, never a target
            (_, ServiceState::Unknown) => false,

            // From Stopped
            (ServiceState::Stopped, ServiceState::Starting) => true,
            (ServiceState::Stopped, ServiceState::Failed) => true, // Start refused

            // From Starting
            (ServiceState::Starting, ServiceState::Running) => true,
            (ServiceState::Starting, ServiceState::Failed) => true,
            (ServiceState::Starting, ServiceState::Stopping) => true, // Cancel startup

            // From Running
            (ServiceState::Running, ServiceState::Stopping) => true,
            (ServiceState::Running, ServiceState::Failed) => true,

            // From Stopping
            (ServiceState::Stopping, ServiceState::Stopped) => true,
            (ServiceState::Stopping, ServiceState::Failed) => true,

            // From Failed
            (ServiceState::Failed, ServiceState::Starting) => true, // Restart
            (ServiceState::Failed, ServiceState::Stopping) => true,
            (ServiceState::Failed, ServiceState::Stopped) => true, // Stop with no process

            // Same state (no-op)
            (state, target) if state == target => true,

            _ => false,
        }
    }

    /// Transition to a new state with an optional reason.
    pub fn transition_to(
        &mut self,
        target_state: ServiceState,
        reason: Option<String>,
    ) -> ServiceResult<()> {
        if !self.is_valid_transition(target_state) {
            return Err(ServiceError::invalid_state(
                &self.service_name,
                format!("{:?}", target_state),
                format!("{:?}", self.current_state),
            ));
        }

        let now = Utc::now();
        self.state_history.push(StateTransition {
            from_state: self.current_state,
            to_state: target_state,
            timestamp: now,
            reason,
        });
        if self.state_history.len() > MAX_HISTORY {
            self.state_history.remove(0);
        }

        self.previous_state = Some(self.current_state);
        self.current_state = target_state;
        self.last_transition_time = now;

        tracing::debug!(
            "Service {} transitioned from {:?} to {:?}",
            self.service_name,
            self.previous_state,
            self.current_state
        );

        Ok(())
    }

    pub fn transition_to_starting(&mut self) -> ServiceResult<()> {
        self.transition_to(
            ServiceState::Starting,
            Some("Service start requested".to_string()),
        )
    }

    pub fn transition_to_running(&mut self) -> ServiceResult<()> {
        self.transition_to(
            ServiceState::Running,
            Some("Service started successfully".to_string()),
        )
    }

    pub fn transition_to_stopping(&mut self) -> ServiceResult<()> {
        self.transition_to(
            ServiceState::Stopping,
            Some("Service stop requested".to_string()),
        )
    }

    pub fn transition_to_stopped(&mut self) -> ServiceResult<()> {
        self.transition_to(
            ServiceState::Stopped,
            Some("Service stopped".to_string()),
        )
    }

    pub fn transition_to_failed(&mut self, reason: String) -> ServiceResult<()> {
        self.transition_to(ServiceState::Failed, Some(reason))
    }

    /// Check if the service can be started
    pub fn can_start(&self) -> bool {
        matches!(
            self.current_state,
            ServiceState::Stopped | ServiceState::Failed
        )
    }

    /// Check if the service can be stopped
    pub fn can_stop(&self) -> bool {
        matches!(
            self.current_state,
            ServiceState::Running | ServiceState::Starting | ServiceState::Failed
        )
    }

    /// Time spent in the current state
    pub fn time_in_current_state(&self) -> chrono::Duration {
        Utc::now() - self.last_transition_time
    }
}
