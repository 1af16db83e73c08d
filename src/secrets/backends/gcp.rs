//! GCP Secret Manager client
//!
//! Implements [`SecretClient`] on top of the `google-secretmanager1` hub.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `SMCACHE_GCP_CREDENTIALS` or `GOOGLE_APPLICATION_CREDENTIALS` - Optional path to a
//!   service account key. Application Default Credentials are used when neither is set.
//!
//! ## Sessions
//!
//! The hub (HTTPS client plus authenticator) is built on the first acquisition and
//! shared by every session afterwards. A failed build is reported as a setup error and
//! attempted again on the next acquisition.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::secrets::error::SecretsError;

#[cfg(feature = "gcp")]
use crate::secrets::client::{
    Replication, SecretClient, SecretClientFactory, SecretVersion, VersionState, VersionStream,
};
#[cfg(feature = "gcp")]
use crate::secrets::error::Result;
#[cfg(feature = "gcp")]
use async_trait::async_trait;
#[cfg(feature = "gcp")]
use std::sync::Arc;
#[cfg(feature = "gcp")]
use tokio::sync::OnceCell;
#[cfg(feature = "gcp")]
use tracing::{debug, info};

#[cfg(feature = "gcp")]
use google_secretmanager1::api::{
    AddSecretVersionRequest, Automatic, DestroySecretVersionRequest, Replication as GcpReplication,
    Secret, SecretPayload,
};
#[cfg(feature = "gcp")]
use google_secretmanager1::{hyper_rustls, hyper_util, SecretManager};

#[cfg(feature = "gcp")]
type Hub = SecretManager<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// Connection settings for the real Secret Manager client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcpClientConfig {
    /// Service account key file; `None` means Application Default Credentials
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
}

impl GcpClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let credentials_file = std::env::var("SMCACHE_GCP_CREDENTIALS")
            .or_else(|_| std::env::var("GOOGLE_APPLICATION_CREDENTIALS"))
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Self { credentials_file }
    }

    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }
}

/// Canonical status names recognized in error text, most specific first.
const STATUS_NAMES: [&str; 7] = [
    "NOT_FOUND",
    "ALREADY_EXISTS",
    "PERMISSION_DENIED",
    "FAILED_PRECONDITION",
    "UNAUTHENTICATED",
    "UNAVAILABLE",
    "DEADLINE_EXCEEDED",
];

/// Map a canonical Google API status name (`error.status` of an error body).
pub fn classify_status(resource: &str, status: &str, message: &str) -> SecretsError {
    match status {
        "NOT_FOUND" => SecretsError::not_found(resource),
        "ALREADY_EXISTS" => SecretsError::already_exists(resource),
        "PERMISSION_DENIED" => SecretsError::permission_denied(resource, message),
        "FAILED_PRECONDITION" => SecretsError::failed_precondition(resource, message),
        "UNAUTHENTICATED" => SecretsError::authentication_failed(message),
        "UNAVAILABLE" | "DEADLINE_EXCEEDED" => SecretsError::connection_failed(message),
        _ => SecretsError::backend_error(format!("{} [{}]", message, resource)),
    }
}

/// Map the HTTP status of a failed response that carried no error body.
pub fn classify_http_status(resource: &str, code: u16, message: &str) -> SecretsError {
    match code {
        404 => SecretsError::not_found(resource),
        409 => SecretsError::already_exists(resource),
        403 => SecretsError::permission_denied(resource, message),
        401 => SecretsError::authentication_failed(message),
        502..=504 => SecretsError::connection_failed(message),
        _ => SecretsError::backend_error(format!("{} [{}]", message, resource)),
    }
}

/// Classify a failure from its text alone.
///
/// Only canonical status names count, and the resource name is removed first, since
/// keys, prefixes and project ids can contain digits or status-like words.
pub fn classify_error_message(resource: &str, message: &str) -> SecretsError {
    let text = message.replace(resource, "");

    match STATUS_NAMES.iter().find(|status| text.contains(*status)) {
        Some(status) => classify_status(resource, status, message),
        None if text.contains("error trying to connect") => {
            SecretsError::connection_failed(message)
        }
        None => SecretsError::backend_error(format!("{} [{}]", message, resource)),
    }
}

/// Classify a hub error by its structured status, falling back to its text.
#[cfg(feature = "gcp")]
fn classify(resource: &str, error: google_secretmanager1::Error) -> SecretsError {
    let message = error.to_string();
    match &error {
        google_secretmanager1::Error::BadRequest(body) => {
            match body.get("error").and_then(|e| e.get("status")).and_then(|s| s.as_str()) {
                Some(status) => classify_status(resource, status, &message),
                None => classify_error_message(resource, &message),
            }
        }
        google_secretmanager1::Error::Failure(response) => {
            classify_http_status(resource, response.status().as_u16(), &message)
        }
        _ => classify_error_message(resource, &message),
    }
}

/// Parse the hub's version representation, which leaves every field optional.
#[cfg(feature = "gcp")]
fn to_version(version: google_secretmanager1::api::SecretVersion) -> Result<SecretVersion> {
    let name = version
        .name
        .ok_or_else(|| SecretsError::backend_error("Secret version without a name"))?;
    let state = match version.state.as_deref() {
        Some(state) => state.parse().unwrap_or(VersionState::Unspecified),
        None => VersionState::Unspecified,
    };
    Ok(SecretVersion::new(name, state))
}

/// Produces sessions backed by Google Cloud Secret Manager
#[cfg(feature = "gcp")]
pub struct GcpClientFactory {
    config: GcpClientConfig,
    hub: OnceCell<Arc<Hub>>,
}

#[cfg(feature = "gcp")]
impl std::fmt::Debug for GcpClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpClientFactory")
            .field("config", &self.config)
            .field("hub", &if self.hub.initialized() { "[SecretManager]" } else { "[pending]" })
            .finish()
    }
}

#[cfg(feature = "gcp")]
impl GcpClientFactory {
    pub fn new(config: GcpClientConfig) -> Self {
        Self { config, hub: OnceCell::new() }
    }

    async fn build_hub(&self) -> Result<Arc<Hub>> {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| {
                SecretsError::connection_failed(format!("Failed to load native TLS roots: {}", e))
            })?
            .https_or_http()
            .enable_http2()
            .build();
        let client =
            hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
                .build(connector);

        let auth = match &self.config.credentials_file {
            Some(path) => {
                let key = yup_oauth2::read_service_account_key(path).await.map_err(|e| {
                    SecretsError::authentication_failed(format!(
                        "Failed to read GCP credentials from {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                yup_oauth2::ServiceAccountAuthenticator::builder(key).build().await
            }
            None => {
                let opts = yup_oauth2::ApplicationDefaultCredentialsFlowOpts::default();
                match yup_oauth2::ApplicationDefaultCredentialsAuthenticator::builder(opts).await {
                    yup_oauth2::authenticator::ApplicationDefaultCredentialsTypes::ServiceAccount(
                        builder,
                    ) => builder.build().await,
                    yup_oauth2::authenticator::ApplicationDefaultCredentialsTypes::InstanceMetadata(
                        builder,
                    ) => builder.build().await,
                }
            }
        }
        .map_err(|e| {
            SecretsError::authentication_failed(format!("Failed to build GCP authenticator: {}", e))
        })?;

        info!(
            explicit_credentials = self.config.credentials_file.is_some(),
            "Initialized GCP Secret Manager client"
        );

        Ok(Arc::new(SecretManager::new(client, auth)))
    }
}

#[cfg(feature = "gcp")]
#[async_trait]
impl SecretClientFactory for GcpClientFactory {
    async fn new_client(&self) -> Result<Box<dyn SecretClient>> {
        let hub = self.hub.get_or_try_init(|| self.build_hub()).await?;
        Ok(Box::new(GcpSecretClient { hub: Arc::clone(hub) }))
    }
}

/// One session against Secret Manager
#[cfg(feature = "gcp")]
pub struct GcpSecretClient {
    hub: Arc<Hub>,
}

#[cfg(feature = "gcp")]
#[async_trait]
impl SecretClient for GcpSecretClient {
    async fn access_secret_version(&self, name: &str) -> Result<Vec<u8>> {
        let (_, response) = self
            .hub
            .projects()
            .secrets_versions_access(name)
            .doit()
            .await
            .map_err(|e| classify(name, e))?;

        Ok(response.payload.and_then(|payload| payload.data).unwrap_or_default())
    }

    fn list_secret_versions<'a>(&'a self, parent: &'a str, page_size: i32) -> VersionStream<'a> {
        Box::pin(async_stream::stream! {
            let mut page_token: Option<String> = None;
            loop {
                let mut call = self.hub.projects().secrets_versions_list(parent).page_size(page_size);
                if let Some(token) = page_token.as_deref() {
                    call = call.page_token(token);
                }

                let response = match call.doit().await {
                    Ok((_, response)) => response,
                    Err(e) => {
                        yield Err(classify(parent, e));
                        break;
                    }
                };
                debug!(parent = %parent, "Fetched a page of secret versions");

                for version in response.versions.unwrap_or_default() {
                    yield to_version(version);
                }

                match response.next_page_token.filter(|token| !token.is_empty()) {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
        })
    }

    async fn destroy_secret_version(&self, name: &str) -> Result<SecretVersion> {
        let (_, version) = self
            .hub
            .projects()
            .secrets_versions_destroy(DestroySecretVersionRequest::default(), name)
            .doit()
            .await
            .map_err(|e| classify(name, e))?;

        to_version(version)
    }

    async fn create_secret(
        &self,
        parent: &str,
        secret_id: &str,
        replication: Replication,
    ) -> Result<()> {
        let replication = match replication {
            Replication::Automatic => GcpReplication {
                automatic: Some(Automatic::default()),
                ..Default::default()
            },
        };
        let request = Secret { replication: Some(replication), ..Default::default() };

        self.hub
            .projects()
            .secrets_create(request, parent)
            .secret_id(secret_id)
            .doit()
            .await
            .map_err(|e| classify(&format!("{}/secrets/{}", parent, secret_id), e))?;

        Ok(())
    }

    async fn add_secret_version(&self, parent: &str, payload: &[u8]) -> Result<SecretVersion> {
        let request = AddSecretVersionRequest {
            payload: Some(SecretPayload { data: Some(payload.to_vec()), ..Default::default() }),
            ..Default::default()
        };

        let (_, version) = self
            .hub
            .projects()
            .secrets_add_version(request, parent)
            .doit()
            .await
            .map_err(|e| classify(parent, e))?;

        to_version(version)
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        self.hub
            .projects()
            .secrets_delete(name)
            .doit()
            .await
            .map_err(|e| classify(name, e))?;

        Ok(())
    }
}
