//! # Configuration Management
//!
//! Configuration for the cache and for logging. Both can be built in code or read
//! from environment variables; a `.env` file is honored by the binary.
//!
//! Environment variables:
//! - `SMCACHE_PROJECT_ID` or `GCP_PROJECT_ID` - Required
//! - `SMCACHE_SECRET_PREFIX` - Optional prefix for secret ids (default: none)
//! - `SMCACHE_KEEP_OLD_VERSIONS` - Keep previous versions after a put (default: false)
//! - `SMCACHE_DEBUG_LOGGING` - Emit debug events for cache operations (default: false)
//! - `SMCACHE_OPERATION_TIMEOUT_SECS` - Deadline for each get/put/delete (default: none)
//! - `SMCACHE_LOG_LEVEL` - Log filter when `RUST_LOG` is unset (default: "info")
//! - `SMCACHE_LOG_JSON` - Emit JSON formatted logs (default: false)

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use validator::Validate;

use crate::errors::{Error, Result};

/// Cache configuration; immutable once handed to the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CacheConfig {
    /// GCP project that owns the secrets, e.g. "my-project-1234". Used verbatim.
    #[validate(length(min = 1, message = "Project ID cannot be empty"))]
    pub project_id: String,

    /// Prepended to every secret id. Handy for IAM conditions and for grouping
    /// secrets by application. Sanitized like keys when the cache is built.
    #[serde(default)]
    pub secret_prefix: String,

    /// Keep previous versions instead of destroying them after each put
    #[serde(default)]
    pub keep_old_versions: bool,

    /// Log key names and resource paths (never payloads) at debug level
    #[serde(default)]
    pub debug_logging: bool,

    /// Deadline for each cache operation, in seconds
    #[serde(default)]
    #[validate(range(min = 1, message = "Operation timeout must be at least 1 second"))]
    pub operation_timeout_secs: Option<u64>,
}

impl CacheConfig {
    /// Create a configuration for `project_id` with every option at its default
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            secret_prefix: String::new(),
            keep_old_versions: false,
            debug_logging: false,
            operation_timeout_secs: None,
        }
    }

    pub fn with_secret_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.secret_prefix = prefix.into();
        self
    }

    pub fn with_keep_old_versions(mut self, keep: bool) -> Self {
        self.keep_old_versions = keep;
        self
    }

    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Deadline applied to each cache operation, if any
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let project_id = env::var("SMCACHE_PROJECT_ID")
            .or_else(|_| env::var("GCP_PROJECT_ID"))
            .map_err(|_| Error::config("Set SMCACHE_PROJECT_ID or GCP_PROJECT_ID"))?;

        let operation_timeout_secs = match env::var("SMCACHE_OPERATION_TIMEOUT_SECS") {
            Ok(value) => Some(value.trim().parse::<u64>().map_err(|e| {
                Error::config(format!("Invalid SMCACHE_OPERATION_TIMEOUT_SECS: {}", e))
            })?),
            Err(_) => None,
        };

        let config = Self {
            project_id,
            secret_prefix: env::var("SMCACHE_SECRET_PREFIX").unwrap_or_default(),
            keep_old_versions: env_flag("SMCACHE_KEEP_OLD_VERSIONS")?,
            debug_logging: env_flag("SMCACHE_DEBUG_LOGGING")?,
            operation_timeout_secs,
        };
        config.validate()?;

        Ok(config)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); ignored when `RUST_LOG` is set
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false }
    }
}

impl LoggingConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            log_level: env::var("SMCACHE_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logging: env_flag("SMCACHE_LOG_JSON")?,
        })
    }
}

/// Parse a boolean environment variable; unset means `false`.
fn env_flag(name: &str) -> Result<bool> {
    match env::var(name) {
        Ok(value) => parse_flag(&value)
            .ok_or_else(|| Error::config(format!("Invalid boolean for {}: '{}'", name, value))),
        Err(_) => Ok(false),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Serializes tests that read or modify process environment variables.
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    const CACHE_VARS: [&str; 6] = [
        "SMCACHE_PROJECT_ID",
        "GCP_PROJECT_ID",
        "SMCACHE_SECRET_PREFIX",
        "SMCACHE_KEEP_OLD_VERSIONS",
        "SMCACHE_DEBUG_LOGGING",
        "SMCACHE_OPERATION_TIMEOUT_SECS",
    ];

    fn clear_cache_vars() {
        for name in CACHE_VARS {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_builder_defaults() {
        let config = CacheConfig::new("my-project");
        assert_eq!(config.project_id, "my-project");
        assert_eq!(config.secret_prefix, "");
        assert!(!config.keep_old_versions);
        assert!(!config.debug_logging);
        assert_eq!(config.operation_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_options() {
        let config = CacheConfig::new("p")
            .with_secret_prefix("site-")
            .with_keep_old_versions(true)
            .with_debug_logging(true)
            .with_operation_timeout(Duration::from_secs(30));

        assert_eq!(config.secret_prefix, "site-");
        assert!(config.keep_old_versions);
        assert!(config.debug_logging);
        assert_eq!(config.operation_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_validation_rejects_empty_project() {
        let err = CacheConfig::new("").validate().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("Project ID cannot be empty"));
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let mut config = CacheConfig::new("p");
        config.operation_timeout_secs = Some(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least 1 second"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: CacheConfig = serde_json::from_str(r#"{"project_id": "p"}"#).unwrap();
        assert_eq!(config, CacheConfig::new("p"));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" YES "), Some(true));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_config_from_env() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_cache_vars();

        env::set_var("SMCACHE_PROJECT_ID", "env-project");
        env::set_var("SMCACHE_SECRET_PREFIX", "testsite-");
        env::set_var("SMCACHE_KEEP_OLD_VERSIONS", "true");
        env::set_var("SMCACHE_OPERATION_TIMEOUT_SECS", "15");

        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.project_id, "env-project");
        assert_eq!(config.secret_prefix, "testsite-");
        assert!(config.keep_old_versions);
        assert!(!config.debug_logging);
        assert_eq!(config.operation_timeout(), Some(Duration::from_secs(15)));

        clear_cache_vars();
    }

    #[test]
    fn test_config_from_env_falls_back_to_gcp_project_id() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_cache_vars();

        env::set_var("GCP_PROJECT_ID", "fallback-project");
        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.project_id, "fallback-project");

        clear_cache_vars();
    }

    #[test]
    fn test_config_from_env_errors() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_cache_vars();

        assert!(matches!(CacheConfig::from_env(), Err(Error::Config(_))));

        env::set_var("SMCACHE_PROJECT_ID", "p");
        env::set_var("SMCACHE_DEBUG_LOGGING", "sometimes");
        assert!(CacheConfig::from_env().is_err());

        env::set_var("SMCACHE_DEBUG_LOGGING", "false");
        env::set_var("SMCACHE_OPERATION_TIMEOUT_SECS", "soon");
        assert!(CacheConfig::from_env().is_err());

        clear_cache_vars();
    }

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logging);
    }
}
