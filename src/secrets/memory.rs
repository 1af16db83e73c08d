//! In-memory Secret Manager for development and testing.
//!
//! [`InMemorySecretService`] models the parts of Secret Manager the cache relies on:
//! secret containers, numbered versions with lifecycle states, `versions/latest`
//! resolution and cursor-based, most-recent-first pagination. It is NOT a persistent
//! store and is intended for tests and local experiments.
//!
//! Beyond storage it records every request it receives, supports fault injection per
//! operation (optionally narrowed to one resource name), and counts client sessions so
//! tests can check that every session is released.
//!
//! # Example
//!
//! ```rust,ignore
//! use smcache::secrets::{InMemorySecretService, Operation, SecretsError};
//!
//! let service = InMemorySecretService::new();
//! service.fail(Operation::AddVersion, SecretsError::backend_error("quota exceeded"));
//!
//! let cache = SecretManagerCache::with_factory(config, Arc::new(service.clone()))?;
//! assert!(cache.put("example.com", b"cert").await.is_err());
//! assert_eq!(service.count(Operation::CreateSecret), 1);
//! ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::client::{
    Replication, SecretClient, SecretClientFactory, SecretVersion, VersionState, VersionStream,
};
use super::error::{Result, SecretsError};

/// Page size used when a listing asks for a non-positive one.
const DEFAULT_PAGE_SIZE: usize = 25;

/// Kinds of request the service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AccessVersion,
    ListVersions,
    DestroyVersion,
    CreateSecret,
    AddVersion,
    DeleteSecret,
}

/// A request as received by the service. Payload bytes are not kept, only their length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedRequest {
    AccessVersion { name: String },
    ListVersions { parent: String, page_size: i32, page_token: Option<String> },
    DestroyVersion { name: String },
    CreateSecret { parent: String, secret_id: String, replication: Replication },
    AddVersion { parent: String, payload_len: usize },
    DeleteSecret { name: String },
}

impl RecordedRequest {
    pub fn operation(&self) -> Operation {
        match self {
            Self::AccessVersion { .. } => Operation::AccessVersion,
            Self::ListVersions { .. } => Operation::ListVersions,
            Self::DestroyVersion { .. } => Operation::DestroyVersion,
            Self::CreateSecret { .. } => Operation::CreateSecret,
            Self::AddVersion { .. } => Operation::AddVersion,
            Self::DeleteSecret { .. } => Operation::DeleteSecret,
        }
    }
}

#[derive(Debug)]
struct Fault {
    operation: Operation,
    resource: Option<String>,
    error: SecretsError,
}

#[derive(Debug)]
struct StoredVersion {
    number: u64,
    state: VersionState,
    payload: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct StoredSecret {
    next_number: u64,
    versions: Vec<StoredVersion>,
}

impl StoredSecret {
    fn push(&mut self, payload: Vec<u8>, state: VersionState) -> u64 {
        self.next_number += 1;
        let number = self.next_number;
        let payload = (state != VersionState::Destroyed).then_some(payload);
        self.versions.push(StoredVersion { number, state, payload });
        number
    }

    fn find_mut(&mut self, number: u64) -> Option<&mut StoredVersion> {
        self.versions.iter_mut().find(|v| v.number == number)
    }
}

#[derive(Debug, Default)]
struct ServiceState {
    secrets: BTreeMap<String, StoredSecret>,
    requests: Vec<RecordedRequest>,
    faults: Vec<Fault>,
    setup_failure: Option<SecretsError>,
    sessions_opened: usize,
    open_sessions: usize,
}

impl ServiceState {
    fn record(&mut self, request: RecordedRequest) {
        self.requests.push(request);
    }

    fn check_fault(&self, operation: Operation, resource: &str) -> Result<()> {
        let fault = self.faults.iter().find(|f| {
            f.operation == operation && f.resource.as_deref().map_or(true, |r| r == resource)
        });
        match fault {
            Some(fault) => Err(fault.error.clone()),
            None => Ok(()),
        }
    }
}

/// Split `projects/p/secrets/s/versions/n` into the secret name and the version part.
fn split_version_name(name: &str) -> Option<(&str, &str)> {
    name.rsplit_once("/versions/")
}

fn version_name(secret: &str, number: u64) -> String {
    format!("{}/versions/{}", secret, number)
}

/// Shared in-memory Secret Manager; clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemorySecretService {
    state: Arc<Mutex<ServiceState>>,
}

impl InMemorySecretService {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create an empty secret container named `projects/<p>/secrets/<id>`.
    pub fn seed_secret(&self, secret: &str) {
        self.lock().secrets.entry(secret.to_string()).or_default();
    }

    /// Append a version in the given state, creating the container if needed.
    ///
    /// Returns the full version name.
    pub fn seed_version(&self, secret: &str, payload: &[u8], state: VersionState) -> String {
        let mut guard = self.lock();
        let number = guard.secrets.entry(secret.to_string()).or_default().push(payload.to_vec(), state);
        version_name(secret, number)
    }

    /// Fail every request of `operation` with `error`.
    pub fn fail(&self, operation: Operation, error: SecretsError) {
        self.lock().faults.push(Fault { operation, resource: None, error });
    }

    /// Fail requests of `operation` that address exactly `resource`.
    pub fn fail_resource(&self, operation: Operation, resource: &str, error: SecretsError) {
        self.lock().faults.push(Fault { operation, resource: Some(resource.to_string()), error });
    }

    /// Make session setup fail with `error`.
    pub fn fail_setup(&self, error: SecretsError) {
        self.lock().setup_failure = Some(error);
    }

    /// Remove all injected faults, including setup failures.
    pub fn clear_faults(&self) {
        let mut guard = self.lock();
        guard.faults.clear();
        guard.setup_failure = None;
    }

    /// All requests received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Number of requests received for `operation`.
    pub fn count(&self, operation: Operation) -> usize {
        self.lock().requests.iter().filter(|r| r.operation() == operation).count()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    pub fn secret_exists(&self, secret: &str) -> bool {
        self.lock().secrets.contains_key(secret)
    }

    /// Versions of `secret`, most recent first. Empty if the secret doesn't exist.
    pub fn versions(&self, secret: &str) -> Vec<SecretVersion> {
        self.lock()
            .secrets
            .get(secret)
            .map(|stored| {
                stored
                    .versions
                    .iter()
                    .rev()
                    .map(|v| SecretVersion::new(version_name(secret, v.number), v.state))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of enabled versions of `secret`.
    pub fn enabled_count(&self, secret: &str) -> usize {
        self.versions(secret).iter().filter(|v| v.is_enabled()).count()
    }

    /// Sessions handed out over the lifetime of the service.
    pub fn sessions_opened(&self) -> usize {
        self.lock().sessions_opened
    }

    /// Sessions handed out and not yet dropped.
    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }

    fn access(&self, name: &str) -> Result<Vec<u8>> {
        let mut guard = self.lock();
        guard.record(RecordedRequest::AccessVersion { name: name.to_string() });
        guard.check_fault(Operation::AccessVersion, name)?;

        let (secret, version) =
            split_version_name(name).ok_or_else(|| SecretsError::not_found(name))?;
        let stored = guard.secrets.get(secret).ok_or_else(|| SecretsError::not_found(name))?;
        let found = if version == "latest" {
            stored.versions.last()
        } else {
            let number: u64 = version.parse().map_err(|_| SecretsError::not_found(name))?;
            stored.versions.iter().find(|v| v.number == number)
        };
        let found = found.ok_or_else(|| SecretsError::not_found(name))?;

        match (&found.payload, found.state) {
            (Some(payload), VersionState::Enabled) => Ok(payload.clone()),
            (_, state) => Err(SecretsError::failed_precondition(
                version_name(secret, found.number),
                format!("version is in {} state", state),
            )),
        }
    }

    fn list_page(
        &self,
        parent: &str,
        page_size: i32,
        page_token: Option<&str>,
    ) -> Result<(Vec<SecretVersion>, Option<String>)> {
        let mut guard = self.lock();
        guard.record(RecordedRequest::ListVersions {
            parent: parent.to_string(),
            page_size,
            page_token: page_token.map(str::to_string),
        });
        guard.check_fault(Operation::ListVersions, parent)?;

        let stored = guard.secrets.get(parent).ok_or_else(|| SecretsError::not_found(parent))?;
        let cursor = match page_token {
            Some(token) => Some(token.parse::<u64>().map_err(|_| {
                SecretsError::backend_error(format!("Invalid page token: {}", token))
            })?),
            None => None,
        };
        let limit = usize::try_from(page_size).ok().filter(|n| *n > 0).unwrap_or(DEFAULT_PAGE_SIZE);

        let remaining: Vec<&StoredVersion> = stored
            .versions
            .iter()
            .rev()
            .filter(|v| cursor.map_or(true, |c| v.number < c))
            .collect();
        let next_token =
            (remaining.len() > limit).then(|| remaining[limit - 1].number.to_string());
        let page = remaining
            .into_iter()
            .take(limit)
            .map(|v| SecretVersion::new(version_name(parent, v.number), v.state))
            .collect();

        Ok((page, next_token))
    }

    fn destroy(&self, name: &str) -> Result<SecretVersion> {
        let mut guard = self.lock();
        guard.record(RecordedRequest::DestroyVersion { name: name.to_string() });
        guard.check_fault(Operation::DestroyVersion, name)?;

        let (secret, version) =
            split_version_name(name).ok_or_else(|| SecretsError::not_found(name))?;
        let number: u64 = version.parse().map_err(|_| SecretsError::not_found(name))?;
        let found = guard
            .secrets
            .get_mut(secret)
            .and_then(|stored| stored.find_mut(number))
            .ok_or_else(|| SecretsError::not_found(name))?;

        if found.state == VersionState::Destroyed {
            return Err(SecretsError::failed_precondition(name, "version is already destroyed"));
        }
        found.state = VersionState::Destroyed;
        found.payload = None;

        Ok(SecretVersion::new(name, VersionState::Destroyed))
    }

    fn create(&self, parent: &str, secret_id: &str, replication: Replication) -> Result<()> {
        let mut guard = self.lock();
        let secret = format!("{}/secrets/{}", parent, secret_id);
        guard.record(RecordedRequest::CreateSecret {
            parent: parent.to_string(),
            secret_id: secret_id.to_string(),
            replication,
        });
        guard.check_fault(Operation::CreateSecret, &secret)?;

        if guard.secrets.contains_key(&secret) {
            return Err(SecretsError::already_exists(secret));
        }
        guard.secrets.insert(secret, StoredSecret::default());
        Ok(())
    }

    fn add(&self, parent: &str, payload: &[u8]) -> Result<SecretVersion> {
        let mut guard = self.lock();
        guard.record(RecordedRequest::AddVersion {
            parent: parent.to_string(),
            payload_len: payload.len(),
        });
        guard.check_fault(Operation::AddVersion, parent)?;

        let stored = guard.secrets.get_mut(parent).ok_or_else(|| SecretsError::not_found(parent))?;
        let number = stored.push(payload.to_vec(), VersionState::Enabled);
        Ok(SecretVersion::new(version_name(parent, number), VersionState::Enabled))
    }

    fn delete(&self, name: &str) -> Result<()> {
        let mut guard = self.lock();
        guard.record(RecordedRequest::DeleteSecret { name: name.to_string() });
        guard.check_fault(Operation::DeleteSecret, name)?;

        guard.secrets.remove(name).map(|_| ()).ok_or_else(|| SecretsError::not_found(name))
    }
}

#[async_trait]
impl SecretClientFactory for InMemorySecretService {
    async fn new_client(&self) -> Result<Box<dyn SecretClient>> {
        let mut guard = self.lock();
        if let Some(error) = &guard.setup_failure {
            return Err(error.clone());
        }
        guard.sessions_opened += 1;
        guard.open_sessions += 1;
        drop(guard);

        Ok(Box::new(InMemorySession { service: self.clone() }))
    }
}

/// Session handed out by [`InMemorySecretService`]; releases itself on drop.
#[derive(Debug)]
struct InMemorySession {
    service: InMemorySecretService,
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        let mut guard = self.service.lock();
        guard.open_sessions = guard.open_sessions.saturating_sub(1);
    }
}

#[async_trait]
impl SecretClient for InMemorySession {
    async fn access_secret_version(&self, name: &str) -> Result<Vec<u8>> {
        self.service.access(name)
    }

    fn list_secret_versions<'a>(&'a self, parent: &'a str, page_size: i32) -> VersionStream<'a> {
        Box::pin(async_stream::stream! {
            let mut page_token: Option<String> = None;
            loop {
                match self.service.list_page(parent, page_size, page_token.as_deref()) {
                    Ok((versions, next_token)) => {
                        for version in versions {
                            yield Ok(version);
                        }
                        match next_token {
                            Some(token) => page_token = Some(token),
                            None => break,
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        })
    }

    async fn destroy_secret_version(&self, name: &str) -> Result<SecretVersion> {
        self.service.destroy(name)
    }

    async fn create_secret(
        &self,
        parent: &str,
        secret_id: &str,
        replication: Replication,
    ) -> Result<()> {
        self.service.create(parent, secret_id, replication)
    }

    async fn add_secret_version(&self, parent: &str, payload: &[u8]) -> Result<SecretVersion> {
        self.service.add(parent, payload)
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        self.service.delete(name)
    }
}
