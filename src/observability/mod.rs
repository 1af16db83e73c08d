//! # Observability Infrastructure
//!
//! Structured logging for the cache. Events carry key names and resource paths as
//! fields; payload bytes are never logged.

pub mod logging;

pub use logging::{init_logging, log_config_info};
