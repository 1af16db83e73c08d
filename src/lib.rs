//! # smcache
//!
//! A certificate cache for ACME clients that keeps its entries in Google Cloud
//! Secret Manager. Each key is stored as a secret, and each write appends a new
//! version to it. Versions that a write supersedes are destroyed unless the cache is
//! configured to keep them.
//!
//! ## Architecture
//!
//! ```text
//! Cache (get/put/delete) → SecretManagerCache → SecretClientFactory → SecretClient
//!                                  ↓                                       ↓
//!                           VersionPruner                    GCP hub / in-memory service
//! ```
//!
//! ## Core Components
//!
//! - **Cache**: the get/put/delete contract and its Secret Manager implementation
//! - **Secrets**: the client traits, resource naming, and the concrete clients
//! - **Config**: cache and logging configuration, from code or the environment
//! - **Observability**: subscriber setup and operation spans
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use smcache::{Cache, CacheConfig, SecretManagerCache};
//!
//! #[tokio::main]
//! async fn main() -> smcache::Result<()> {
//!     let config = CacheConfig::new("example-project-1234").with_secret_prefix("testsite-");
//!     let cache = SecretManagerCache::new(config)?;
//!
//!     cache.put("www.example.com", b"this is some data").await?;
//!     let data = cache.get("www.example.com").await?;
//!     assert_eq!(data, b"this is some data");
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod observability;
pub mod secrets;

// Re-export commonly used types and traits
pub use cache::{prune::PruneReport, Cache, SecretManagerCache};
pub use config::{CacheConfig, LoggingConfig};
pub use errors::{Error, Result, Stage};
pub use observability::init_logging;
pub use secrets::{SecretClient, SecretClientFactory, SecretsError};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
