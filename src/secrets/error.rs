//! Error types for Secret Manager operations.
//!
//! Every remote call made through a [`SecretClient`](super::SecretClient) fails with a
//! [`SecretsError`]. The cache layer only ever branches on [`SecretsError::is_not_found`];
//! the remaining variants exist so callers and logs can tell a permissions problem from
//! a transport problem.

use thiserror::Error;

/// Result type for secret service operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Errors reported by the remote secret service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretsError {
    /// The secret or secret version does not exist.
    #[error("Secret not found: {resource}")]
    NotFound { resource: String },

    /// The secret container already exists.
    #[error("Secret already exists: {resource}")]
    AlreadyExists { resource: String },

    /// The caller lacks IAM permission for the resource.
    #[error("Permission denied for '{resource}': {message}")]
    PermissionDenied { resource: String, message: String },

    /// The resource is in a state that does not allow the operation
    /// (for example destroying an already destroyed version).
    #[error("Failed precondition for '{resource}': {message}")]
    FailedPrecondition { resource: String, message: String },

    /// Credentials were missing, unreadable or rejected.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The service could not be reached.
    #[error("Backend connection failed: {message}")]
    ConnectionFailed { message: String },

    /// Any other service-side failure.
    #[error("Backend error: {message}")]
    BackendError { message: String },
}

impl SecretsError {
    /// Create a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    /// Create an already exists error.
    pub fn already_exists(resource: impl Into<String>) -> Self {
        Self::AlreadyExists { resource: resource.into() }
    }

    /// Create a permission denied error.
    pub fn permission_denied(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PermissionDenied { resource: resource.into(), message: message.into() }
    }

    /// Create a failed precondition error.
    pub fn failed_precondition(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FailedPrecondition { resource: resource.into(), message: message.into() }
    }

    /// Create an authentication failed error.
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed { message: message.into() }
    }

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: message.into() }
    }

    /// Create a backend error.
    pub fn backend_error(message: impl Into<String>) -> Self {
        Self::BackendError { message: message.into() }
    }

    /// Whether the service reported that the addressed resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = SecretsError::not_found("projects/p/secrets/s");
        assert!(matches!(err, SecretsError::NotFound { .. }));
        assert_eq!(err.to_string(), "Secret not found: projects/p/secrets/s");

        let err = SecretsError::connection_failed("timeout");
        assert!(matches!(err, SecretsError::ConnectionFailed { .. }));

        let err = SecretsError::permission_denied("projects/p", "missing secretmanager.secrets.create");
        assert!(err.to_string().contains("projects/p"));
        assert!(err.to_string().contains("secretmanager.secrets.create"));
    }

    #[test]
    fn test_is_not_found() {
        assert!(SecretsError::not_found("x").is_not_found());
        assert!(!SecretsError::already_exists("x").is_not_found());
        assert!(!SecretsError::failed_precondition("x", "destroyed").is_not_found());
        assert!(!SecretsError::backend_error("boom").is_not_found());
    }
}
