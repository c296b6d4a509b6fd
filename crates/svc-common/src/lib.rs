//! # svc-common
//!
//! Shared error types for the service supervisor.
//!
//! Every fallible supervisor API returns [`ServiceResult`], so callers can
//! pattern match on [`ServiceError`] variants instead of parsing strings.

pub mod errors;

pub use errors::{ServiceError, ServiceResult};
