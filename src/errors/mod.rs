//! # Error Handling
//!
//! Error types for the cache layer, built with `thiserror`.
//!
//! A remote failure always reaches the caller as [`Error::Remote`], carrying the
//! [`Stage`] that failed, the resolved resource name, and the untouched
//! [`SecretsError`] as its source. The two remote outcomes that are *not* errors
//! (a missing secret on `get`, a missing secret on `delete`) never reach this type
//! except as [`Error::CacheMiss`] or `Ok(())`.

use std::fmt;

use crate::secrets::SecretsError;

/// Custom result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Step of a cache operation that issued a remote request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    AccessLatest,
    ListVersions,
    CreateSecret,
    AddVersion,
    DeleteSecret,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::AccessLatest => "access latest version",
            Stage::ListVersions => "list secret versions",
            Stage::CreateSecret => "create secret",
            Stage::AddVersion => "add secret version",
            Stage::DeleteSecret => "delete secret",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the cache
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No readable data is stored under the key
    #[error("cache miss")]
    CacheMiss,

    /// A client session could not be established
    #[error("failed to setup client: {source}")]
    ClientSetup {
        #[source]
        source: SecretsError,
    },

    /// A remote request failed
    #[error("failed to {stage} [{resource}]: {source}")]
    Remote {
        stage: Stage,
        resource: String,
        #[source]
        source: SecretsError,
    },

    /// The operation did not finish before the configured deadline
    #[error("Operation timed out: {operation} after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Create a client setup error
    pub fn client_setup(source: SecretsError) -> Self {
        Self::ClientSetup { source }
    }

    /// Create a remote operation error
    pub fn remote<S: Into<String>>(stage: Stage, resource: S, source: SecretsError) -> Self {
        Self::Remote { stage, resource: resource.into(), source }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration_ms: u64) -> Self {
        Self::Timeout { operation: operation.into(), duration_ms }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this is the defined "no data for key" outcome of `get`
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Error::CacheMiss)
    }

    /// The service error behind this error, if any
    pub fn remote_error(&self) -> Option<&SecretsError> {
        match self {
            Error::ClientSetup { source } | Error::Remote { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The stage that failed, for remote errors
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Remote { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Check if the failed operation may succeed when repeated
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ClientSetup { .. } | Error::Timeout { .. } => true,
            Error::Remote { source, .. } => !matches!(
                source,
                SecretsError::PermissionDenied { .. } | SecretsError::AuthenticationFailed { .. }
            ),
            Error::CacheMiss | Error::Config(_) | Error::Validation(_) => false,
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let message = fields
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}
