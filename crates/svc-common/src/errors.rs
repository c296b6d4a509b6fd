//! Error types for service supervision.

use thiserror::Error;

/// Result type alias for supervisor operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Error type covering every supervisor failure mode.
///
/// Each variant carries the service name plus enough context to act on the
/// failure without re-querying the service.
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("Service not found: {name}")]
    NotFound { name: String },

    #[error("Service already exists: {name}")]
    AlreadyExists { name: String },

    #[error("Service spawn failed: {name} - {reason}")]
    SpawnFailed { name: String, reason: String },

    #[error("Service start failed: {name} - {reason}")]
    StartFailed { name: String, reason: String },

    #[error("Service stop failed: {name} - {reason}")]
    StopFailed { name: String, reason: String },

    #[error("Dependency not ready: {name} requires {dependency}")]
    DependencyNotReady { name: String, dependency: String },

    #[error("Service state error: {name} - expected {expected}, got {actual}")]
    InvalidState {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Service timeout: {name} - {operation}")]
    Timeout { name: String, operation: String },

    #[error("Service configuration error: {name} - {reason}")]
    Configuration { name: String, reason: String },

    #[error("Persistence error: {reason}")]
    Persistence { reason: String },
}

impl ServiceError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn already_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists { name: name.into() }
    }

    pub fn spawn_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn start_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StartFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn stop_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StopFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn dependency_not_ready(
        name: impl Into<String>,
        dependency: impl Into<String>,
    ) -> Self {
        Self::DependencyNotReady {
            name: name.into(),
            dependency: dependency.into(),
        }
    }

    pub fn invalid_state(
        name: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            name: name.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn timeout(name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Timeout {
            name: name.into(),
            operation: operation.into(),
        }
    }

    pub fn configuration(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn persistence(reason: impl Into<String>) -> Self {
        Self::Persistence {
            reason: reason.into(),
        }
    }

    /// The service name the error refers to, if the variant carries one.
    pub fn service_name(&self) -> Option<&str> {
        match self {
            Self::NotFound { name }
            | Self::AlreadyExists { name }
            | Self::SpawnFailed { name, .. }
            | Self::StartFailed { name, .. }
            | Self::StopFailed { name, .. }
            | Self::DependencyNotReady { name, .. }
            | Self::InvalidState { name, .. }
            | Self::Timeout { name, .. }
            | Self::Configuration { name, .. } => Some(name),
            Self::Persistence { .. } => None,
        }
    }
}
