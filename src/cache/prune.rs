//! Best-effort removal of superseded secret versions.
//!
//! After a put has appended a new version, every version that was listed before it
//! is a candidate for destruction. Only `ENABLED` versions are destroyed: the cache
//! never leaves versions in any other state, and the service rejects destroying a
//! version twice. A failed destroy is logged and pruning moves on to the next
//! version; nothing here is ever reported to the caller as an error.

use futures::StreamExt;
use tracing::{debug, warn};

use crate::secrets::{SecretClient, SecretVersion, VersionStream};

/// What a pruning pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Versions pulled from the listing
    pub examined: usize,
    /// Destroy requests issued
    pub attempted: usize,
    /// Destroy requests that succeeded
    pub destroyed: usize,
    /// Destroy requests that failed
    pub failed: usize,
    /// Versions left alone: not enabled, or the version the put just wrote
    pub skipped: usize,
    /// The listing ended with an error instead of running out
    pub listing_interrupted: bool,
}

/// Destroys the enabled versions produced by a listing.
pub struct VersionPruner<'a> {
    client: &'a dyn SecretClient,
    keep: Option<&'a str>,
    log_events: bool,
}

impl<'a> VersionPruner<'a> {
    pub fn new(client: &'a dyn SecretClient) -> Self {
        Self { client, keep: None, log_events: false }
    }

    /// Never destroy the version named `name`.
    pub fn keeping(mut self, name: &'a str) -> Self {
        self.keep = Some(name);
        self
    }

    /// Log each destroy outcome.
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.log_events = enabled;
        self
    }

    /// Walk `first` followed by the rest of the listing, destroying enabled versions.
    ///
    /// `first` is the element the caller already pulled off `rest`. When it is `None`
    /// the listing was empty (or failed) and `rest` is not polled at all.
    pub async fn prune(&self, first: Option<SecretVersion>, mut rest: VersionStream<'_>) -> PruneReport {
        let mut report = PruneReport::default();
        let mut current = first;

        while let Some(version) = current.take() {
            report.examined += 1;

            if !version.is_enabled() || self.keep == Some(version.name.as_str()) {
                report.skipped += 1;
            } else {
                report.attempted += 1;
                match self.client.destroy_secret_version(&version.name).await {
                    Ok(_) => {
                        report.destroyed += 1;
                        if self.log_events {
                            debug!(version = %version.name, "Destroyed secret version");
                        }
                    }
                    Err(e) => {
                        report.failed += 1;
                        if self.log_events {
                            warn!(version = %version.name, error = %e, "Failed to destroy secret version");
                        }
                    }
                }
            }

            current = match rest.next().await {
                Some(Ok(next)) => Some(next),
                Some(Err(e)) => {
                    report.listing_interrupted = true;
                    if self.log_events {
                        warn!(error = %e, "Stopped pruning, listing secret versions failed");
                    }
                    None
                }
                None => None,
            };
        }

        report
    }
}
