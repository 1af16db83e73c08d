//! Secret Manager client traits and types.
//!
//! The cache never talks to Secret Manager directly. It asks a [`SecretClientFactory`]
//! for a [`SecretClient`] session at the start of every operation and drops it on the
//! way out, so any implementation (the real GCP client, or the in-memory service used
//! in tests) can be plugged in.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::Result;

/// Lazily produced, most-recent-first sequence of secret versions.
///
/// Pages are only requested from the service as the stream is polled. The stream ends
/// after the last page, or right after yielding an error.
pub type VersionStream<'a> = BoxStream<'a, Result<SecretVersion>>;

/// Lifecycle state of a secret version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionState {
    /// State not reported by the service
    #[serde(rename = "STATE_UNSPECIFIED")]
    Unspecified,
    /// Readable; the only state that pruning acts on
    Enabled,
    /// Not readable but recoverable
    Disabled,
    /// Payload irrevocably removed
    Destroyed,
}

impl VersionState {
    /// Get the wire representation of this state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "STATE_UNSPECIFIED",
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
            Self::Destroyed => "DESTROYED",
        }
    }
}

impl FromStr for VersionState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "STATE_UNSPECIFIED" => Ok(Self::Unspecified),
            "ENABLED" => Ok(Self::Enabled),
            "DISABLED" => Ok(Self::Disabled),
            "DESTROYED" => Ok(Self::Destroyed),
            _ => Err(format!("Unknown secret version state: {}", s)),
        }
    }
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One version of a secret as reported by a listing or a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretVersion {
    /// Full resource name, `projects/<p>/secrets/<s>/versions/<n>`
    pub name: String,

    /// Current lifecycle state
    pub state: VersionState,
}

impl SecretVersion {
    /// Create a version descriptor.
    pub fn new(name: impl Into<String>, state: VersionState) -> Self {
        Self { name: name.into(), state }
    }

    /// Whether the version is currently readable.
    pub fn is_enabled(&self) -> bool {
        self.state == VersionState::Enabled
    }
}

/// Replication policy for newly created secret containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Replication {
    /// Google-managed multi-region replication
    Automatic,
}

/// One client session against the secret service.
///
/// A session is scoped to a single cache operation and released when dropped.
///
/// # Security Considerations
///
/// - Implementations MUST NOT log payload bytes
/// - Errors MUST NOT embed payload bytes
#[async_trait]
pub trait SecretClient: Send + Sync {
    /// Read the payload of a version, usually `.../versions/latest`.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::NotFound`](super::SecretsError::NotFound) if the secret or version doesn't exist
    async fn access_secret_version(&self, name: &str) -> Result<Vec<u8>>;

    /// List the versions of the secret `parent`, most recent first.
    ///
    /// Nothing is requested until the returned stream is polled. A missing secret
    /// surfaces as a `NotFound` item on the first poll.
    fn list_secret_versions<'a>(&'a self, parent: &'a str, page_size: i32) -> VersionStream<'a>;

    /// Irrevocably destroy the version `name`.
    async fn destroy_secret_version(&self, name: &str) -> Result<SecretVersion>;

    /// Create the secret container `<parent>/secrets/<secret_id>`.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::AlreadyExists`](super::SecretsError::AlreadyExists) if the container exists
    async fn create_secret(
        &self,
        parent: &str,
        secret_id: &str,
        replication: Replication,
    ) -> Result<()>;

    /// Append a new enabled version carrying `payload` to the secret `parent`.
    async fn add_secret_version(&self, parent: &str, payload: &[u8]) -> Result<SecretVersion>;

    /// Delete the secret container `name` together with all of its versions.
    async fn delete_secret(&self, name: &str) -> Result<()>;
}

/// Produces one [`SecretClient`] session per cache operation.
#[async_trait]
pub trait SecretClientFactory: Send + Sync + fmt::Debug {
    /// Open a new session.
    ///
    /// # Errors
    ///
    /// Any error here means the session could not be established (credentials,
    /// transport setup); no remote request has been made.
    async fn new_client(&self) -> Result<Box<dyn SecretClient>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_state_roundtrip() {
        for state in [
            VersionState::Unspecified,
            VersionState::Enabled,
            VersionState::Disabled,
            VersionState::Destroyed,
        ] {
            let parsed: VersionState = state.as_str().parse().unwrap();
            assert_eq!(state, parsed);
        }
        assert!("PENDING".parse::<VersionState>().is_err());
    }

    #[test]
    fn test_version_state_serialization() {
        let json = serde_json::to_string(&VersionState::Enabled).unwrap();
        assert_eq!(json, "\"ENABLED\"");

        let json = serde_json::to_string(&VersionState::Unspecified).unwrap();
        assert_eq!(json, "\"STATE_UNSPECIFIED\"");

        let parsed: VersionState = serde_json::from_str("\"DESTROYED\"").unwrap();
        assert_eq!(parsed, VersionState::Destroyed);
    }

    #[test]
    fn test_secret_version_is_enabled() {
        assert!(SecretVersion::new("v/1", VersionState::Enabled).is_enabled());
        assert!(!SecretVersion::new("v/2", VersionState::Disabled).is_enabled());
        assert!(!SecretVersion::new("v/3", VersionState::Destroyed).is_enabled());
    }
}
