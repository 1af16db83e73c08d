//! # Secret Manager Cache
//!
//! [`SecretManagerCache`] implements the [`Cache`] contract on top of Secret Manager.
//! Each cache key maps to one secret; each put appends a new version to it.
//!
//! ## Put
//!
//! Secret Manager has no upsert, so a put first lists the existing versions of the
//! secret. A `NOT_FOUND` from the listing means this is the first write for the key
//! and the secret is created. The new version is then appended, and only after that
//! succeeded are the previously listed versions destroyed (unless
//! [`CacheConfig::keep_old_versions`] is set). Readers therefore never observe an
//! existing key without an enabled version.
//!
//! Failures are surfaced from the list, create and append steps only. Destroying old
//! versions is best effort; see [`prune`].
//!
//! ## Partial failures
//!
//! If the secret is created but appending the version fails, an empty secret is left
//! behind. `get` reports a cache miss for it, and the next `put` skips the create
//! step and appends straight away. Nothing is rolled back.
//!
//! ## Concurrency
//!
//! The cache holds only immutable configuration and a client factory, so it can be
//! shared freely across tasks. Concurrent puts for the same key are not coordinated;
//! they may leave more than one enabled version until the next put prunes them.
//! Dropping an operation's future cancels the in-flight request and abandons the
//! remaining steps.

pub mod prune;

use async_trait::async_trait;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

use crate::config::CacheConfig;
use crate::errors::{Error, Result, Stage};
use crate::secrets::{sanitize, Replication, SecretClient, SecretClientFactory, SecretNames};
use prune::VersionPruner;

#[cfg(feature = "gcp")]
use crate::secrets::backends::gcp::{GcpClientConfig, GcpClientFactory};

/// Versions requested per listing page. A handful is enough to find the stale ones.
pub const LIST_PAGE_SIZE: i32 = 10;

/// Emit a debug event only when the cache was configured with debug logging.
macro_rules! debug_event {
    ($cache:expr, $($arg:tt)+) => {
        if $cache.config.debug_logging {
            tracing::debug!($($arg)+);
        }
    };
}

/// Key/value store for certificate material, as used by ACME clients.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Return the data stored under `key`.
    ///
    /// # Errors
    ///
    /// - [`Error::CacheMiss`] if nothing is stored under `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Store `data` under `key`, replacing any previous data.
    async fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Remove the data stored under `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// [`Cache`] backed by Secret Manager.
#[derive(Debug, Clone)]
pub struct SecretManagerCache {
    config: CacheConfig,
    factory: Arc<dyn SecretClientFactory>,
}

impl SecretManagerCache {
    /// Create a cache that talks to Google Cloud Secret Manager.
    ///
    /// Credentials are resolved from the environment on first use.
    #[cfg(feature = "gcp")]
    pub fn new(config: CacheConfig) -> Result<Self> {
        let factory = GcpClientFactory::new(GcpClientConfig::from_env());
        Self::with_factory(config, Arc::new(factory))
    }

    /// Create a cache that obtains its client sessions from `factory`.
    ///
    /// The configured secret prefix is sanitized here, once.
    pub fn with_factory(
        mut config: CacheConfig,
        factory: Arc<dyn SecretClientFactory>,
    ) -> Result<Self> {
        config.validate()?;
        config.secret_prefix = sanitize(&config.secret_prefix);

        Ok(Self { config, factory })
    }

    /// The effective configuration, with the prefix already sanitized.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Resource names for `key`, after sanitizing it.
    pub fn names_for(&self, key: &str) -> SecretNames {
        SecretNames::new(&self.config.project_id, &self.config.secret_prefix, &sanitize(key))
    }

    async fn acquire(&self) -> Result<Box<dyn SecretClient>> {
        self.factory.new_client().await.map_err(Error::client_setup)
    }

    async fn with_deadline<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.config.operation_timeout() {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                Error::timeout(operation, u64::try_from(limit.as_millis()).unwrap_or(u64::MAX))
            })?,
            None => fut.await,
        }
    }

    async fn get_latest(&self, key: &str) -> Result<Vec<u8>> {
        let names = self.names_for(key);
        debug_event!(self, secret_id = %names.secret_id(), "Get called");

        let client = self.acquire().await?;
        let name = names.latest_version();
        debug_event!(self, resource = %name, "Reading latest secret version");

        match client.access_secret_version(&name).await {
            Ok(data) => {
                debug_event!(self, resource = %name, "Read latest secret version");
                Ok(data)
            }
            Err(e) if e.is_not_found() => {
                debug_event!(self, resource = %name, "No secret version found");
                Err(Error::CacheMiss)
            }
            Err(e) => Err(Error::remote(Stage::AccessLatest, name, e)),
        }
    }

    async fn put_version(&self, key: &str, data: &[u8]) -> Result<()> {
        let names = self.names_for(key);
        debug_event!(self, secret_id = %names.secret_id(), "Put called");

        let client = self.acquire().await?;
        let parent = names.secret();

        // NOT_FOUND from the listing is how a first write for the key is detected.
        let mut versions = client.list_secret_versions(&parent, LIST_PAGE_SIZE);
        let first = match versions.next().await {
            Some(Ok(version)) => Some(version),
            None => None,
            Some(Err(e)) if e.is_not_found() => {
                self.create_secret(client.as_ref(), &names).await?;
                None
            }
            Some(Err(e)) => return Err(Error::remote(Stage::ListVersions, &parent, e)),
        };

        let added = client
            .add_secret_version(&parent, data)
            .await
            .map_err(|e| Error::remote(Stage::AddVersion, &parent, e))?;
        debug_event!(self, version = %added.name, "Added secret version");

        if self.config.keep_old_versions {
            return Ok(());
        }

        let report = VersionPruner::new(client.as_ref())
            .keeping(&added.name)
            .with_logging(self.config.debug_logging)
            .prune(first, versions)
            .await;
        debug_event!(
            self,
            resource = %parent,
            examined = report.examined,
            destroyed = report.destroyed,
            failed = report.failed,
            "Pruned old secret versions"
        );

        Ok(())
    }

    async fn create_secret(&self, client: &dyn SecretClient, names: &SecretNames) -> Result<()> {
        let parent = names.project();
        debug_event!(self, parent = %parent, secret_id = %names.secret_id(), "Creating secret");

        match client.create_secret(&parent, names.secret_id(), Replication::Automatic).await {
            Ok(()) => Ok(()),
            // Lost a race with a concurrent put for the same key.
            Err(crate::secrets::SecretsError::AlreadyExists { .. }) => {
                debug_event!(self, secret_id = %names.secret_id(), "Secret already exists");
                Ok(())
            }
            Err(e) => Err(Error::remote(Stage::CreateSecret, names.secret(), e)),
        }
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        let names = self.names_for(key);
        debug_event!(self, secret_id = %names.secret_id(), "Delete called");

        let client = self.acquire().await?;
        let name = names.secret();

        match client.delete_secret(&name).await {
            Ok(()) => {
                debug_event!(self, resource = %name, "Deleted secret");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug_event!(self, resource = %name, "Secret already absent");
                Ok(())
            }
            Err(e) => Err(Error::remote(Stage::DeleteSecret, name, e)),
        }
    }
}

#[async_trait]
impl Cache for SecretManagerCache {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.with_deadline("get", self.get_latest(key))
            .instrument(crate::cache_span!("get", key))
            .await
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.with_deadline("put", self.put_version(key, data))
            .instrument(crate::cache_span!("put", key, keep_old_versions = self.config.keep_old_versions))
            .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.with_deadline("delete", self.delete_secret(key))
            .instrument(crate::cache_span!("delete", key))
            .await
    }
}
