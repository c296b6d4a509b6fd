//! # svc-supervisor
//!
//! Service supervision: launches, monitors, restarts, and tears down
//! long-running OS processes according to declared dependency order,
//! priority, and restart policy.
//!
//! The main entry point is [`ServiceManager`]: it owns the service
//! registry, computes startup/shutdown order, persists configuration, and
//! exposes the control surface. Each registered [`Service`] runs its own
//! monitor loop that detects unexpected exits and applies the bounded
//! restart policy.

pub mod config;
pub mod controller;
pub mod events;
pub mod manager;
pub mod ordering;
pub mod resources;
pub mod service;
pub mod snapshot;
pub mod status;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ServiceConfig, ServicePriority, ServiceRegistry, ServiceType};
pub use controller::{OsProcessController, ProcessController};
pub use events::{ErrorCallback, EventSinks, StatusCallback};
pub use manager::ServiceManager;
pub use resources::ResourceSampler;
pub use service::Service;
pub use snapshot::{ServiceSnapshot, StateSnapshot};
pub use status::ServiceStatus;
pub use svc_state::{ServiceState, ServiceStateMachine};
