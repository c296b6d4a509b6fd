//! Validation helpers for service names and executable paths.

use svc_common::{ServiceError, ServiceResult};

/// Validate a service name: non-empty, alphanumeric plus `-` and `_`.
pub fn validate_service_name(name: &str) -> ServiceResult<()> {
    if name.is_empty() {
        return Err(ServiceError::configuration(
            "validation",
            "Service name cannot be empty",
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ServiceError::configuration(
            name,
            "Service name can only contain alphanumeric characters, hyphens, and underscores",
        ));
    }

    Ok(())
}

/// Validate an executable path is present.
///
/// Existence is not checked here: the binary may live on a PATH lookup or
/// appear later (e.g. a mount), and spawn reports a precise error anyway.
pub fn validate_executable_path(name: &str, path: &str) -> ServiceResult<()> {
    if path.is_empty() {
        return Err(ServiceError::configuration(
            name,
            "Executable path cannot be empty",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_service_name("network").is_ok());
        assert!(validate_service_name("my-service_2").is_ok());
    }

    #[test]
    fn test_invalid_names() {
        assert!(validate_service_name("").is_err());
        assert!(validate_service_name("bad name").is_err());
        assert!(validate_service_name("slash/name").is_err());
    }

    #[test]
    fn test_executable_path() {
        assert!(validate_executable_path("svc", "/usr/bin/true").is_ok());
        assert!(validate_executable_path("svc", "").is_err());
    }
}
