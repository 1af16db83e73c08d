//! Secret Manager access layer.
//!
//! This module defines the narrow client surface the cache needs from Secret Manager
//! and the resource naming rules it applies to keys.
//!
//! # Architecture
//!
//! Sessions are produced by a [`SecretClientFactory`] and used through the
//! [`SecretClient`] trait:
//! - **access_secret_version**: read one version's payload
//! - **list_secret_versions**: lazily stream versions, most recent first
//! - **destroy_secret_version**: irreversibly remove a version's payload
//! - **create_secret**: create an empty secret container
//! - **add_secret_version**: append a version
//! - **delete_secret**: remove a container and all of its versions
//!
//! A session is released when its boxed client is dropped.
//!
//! # Implementations
//!
//! - **GCP Secret Manager** ([`backends::gcp`]), behind the `gcp` feature
//! - **In-memory** ([`memory::InMemorySecretService`]), for tests and local runs
//!
//! # Example
//!
//! ```rust,ignore
//! use smcache::secrets::{InMemorySecretService, SecretClientFactory, SecretNames};
//!
//! let service = InMemorySecretService::new();
//! let client = service.new_client().await?;
//!
//! let names = SecretNames::new("my-project", "site-", "example_com");
//! client.create_secret(&names.project(), names.secret_id(), Replication::Automatic).await?;
//! client.add_secret_version(&names.secret(), b"cert").await?;
//! let data = client.access_secret_version(&names.latest_version()).await?;
//! ```
//!
//! # Security Considerations
//!
//! - Payloads are never logged or included in error messages
//! - Destroyed versions cannot be recovered

pub mod backends;
pub mod client;
pub mod error;
pub mod memory;
pub mod naming;

// Re-export main types
pub use client::{
    Replication, SecretClient, SecretClientFactory, SecretVersion, VersionState, VersionStream,
};
pub use error::{Result, SecretsError};
pub use memory::{InMemorySecretService, Operation, RecordedRequest};
pub use naming::{sanitize, SecretNames};
