//! # svc-process
//!
//! Low-level process operations for the service supervisor.
//!
//! Cross-platform primitives for:
//! - Process spawning with arguments, working directory, and environment
//! - Graceful and forced termination
//! - Process existence checking
//! - Name and path validation

pub mod check;
pub mod execute;
pub mod terminate;
pub mod validation;

pub use check::*;
pub use execute::*;
pub use terminate::*;
pub use validation::*;
