//! Concrete Secret Manager clients
//!
//! - **GCP Secret Manager**: the production client, compiled with the `gcp` feature.
//!   Its configuration and error classification are always available.

pub mod gcp;

pub use gcp::{classify_error_message, classify_http_status, classify_status, GcpClientConfig};

#[cfg(feature = "gcp")]
pub use gcp::{GcpClientFactory, GcpSecretClient};
