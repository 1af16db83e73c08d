//! # Structured Logging
//!
//! Subscriber setup and span macros built on the tracing ecosystem.
//!
//! Library code only emits events; installing a subscriber is left to the binary
//! (or to the embedding application) through [`init_logging`].

use tracing_subscriber::EnvFilter;
use validator::Validate;

use crate::config::LoggingConfig;
use crate::errors::{Error, Result};

/// Create a tracing span for a cache operation.
///
/// ```rust,ignore
/// let span = cache_span!("put", key);
/// let span = cache_span!("put", key, keep_old_versions = true);
/// ```
#[macro_export]
macro_rules! cache_span {
    ($operation:expr, $key:expr) => {
        tracing::debug_span!(
            "cache_operation",
            operation = %$operation,
            key = %$key,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $key:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "cache_operation",
            operation = %$operation,
            key = %$key,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install the global `fmt` subscriber.
///
/// `RUST_LOG` wins over `config.log_level` when set. Fails if a global subscriber
/// is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    Validate::validate(config)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| Error::config(format!("Invalid log filter '{}': {}", config.log_level, e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json_logging { builder.json().try_init() } else { builder.try_init() };

    installed.map_err(|e| Error::config(format!("Failed to install tracing subscriber: {}", e)))
}

/// Log the effective cache configuration at startup
pub fn log_config_info(config: &crate::config::CacheConfig) {
    tracing::info!(
        project_id = %config.project_id,
        secret_prefix = %config.secret_prefix,
        keep_old_versions = config.keep_old_versions,
        debug_logging = config.debug_logging,
        operation_timeout_secs = ?config.operation_timeout_secs,
        "Secret Manager cache configuration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        let _span = cache_span!("get", "example.com");
        let _span = cache_span!("put", "example.com", keep_old_versions = true);
    }

    #[test]
    fn test_init_logging_rejects_empty_level() {
        let config = LoggingConfig { log_level: String::new(), json_logging: false };
        assert!(matches!(init_logging(&config), Err(Error::Validation(_))));
    }

    #[test]
    fn test_log_config_info() {
        log_config_info(&crate::config::CacheConfig::new("p"));
    }
}
