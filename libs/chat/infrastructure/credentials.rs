//! Credential sources for the session
//!
//! - [`CognitoCredentials`]: unauthenticated identity from a Cognito
//!   identity pool, the way a browser client gets its credentials
//! - [`EnvCredentials`]: static keys from the process environment

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use iotsockets::{CredentialProvider, Credentials, IotSocketError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_GET_ID: &str = "AWSCognitoIdentityService.GetId";
const TARGET_GET_CREDENTIALS: &str = "AWSCognitoIdentityService.GetCredentialsForIdentity";

/// Refresh cached credentials this long before they expire
const REFRESH_MARGIN_MINUTES: i64 = 5;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Identity service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Response is missing {0}")]
    MissingField(&'static str),

    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),
}

impl From<CredentialError> for IotSocketError {
    fn from(e: CredentialError) -> Self {
        IotSocketError::Credentials(e.to_string())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdRequest<'a> {
    identity_pool_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdResponse {
    identity_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsRequest<'a> {
    identity_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsResponse {
    credentials: Option<IdentityCredentials>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IdentityCredentials {
    access_key_id: Option<String>,
    secret_key: Option<String>,
    session_token: Option<String>,
    /// Seconds since the epoch
    expiration: Option<f64>,
}

/// Error body of the identity service
#[derive(Deserialize, Default)]
struct ServiceError {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

/// Credentials for an unauthenticated identity in a Cognito identity pool
///
/// The identity id is fetched once and reused; credentials are cached until
/// five minutes before they expire.
pub struct CognitoCredentials {
    client: reqwest::Client,
    endpoint: String,
    identity_pool_id: String,
    identity_id: Mutex<Option<String>>,
    cached: Mutex<Option<Credentials>>,
}

impl CognitoCredentials {
    pub fn new(region: &str, identity_pool_id: impl Into<String>) -> Self {
        Self::with_endpoint(
            format!("https://cognito-identity.{}.amazonaws.com/", region),
            identity_pool_id,
        )
    }

    /// Use a custom service endpoint
    pub fn with_endpoint(endpoint: impl Into<String>, identity_pool_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            identity_pool_id: identity_pool_id.into(),
            identity_id: Mutex::new(None),
            cached: Mutex::new(None),
        }
    }

    /// Identity id resolved so far, if any
    pub fn identity_id(&self) -> Option<String> {
        self.identity_id.lock().clone()
    }

    /// Drop cached credentials so the next call fetches fresh ones
    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }

    async fn call<B, R>(&self, target: &str, body: &B) -> Result<R, CredentialError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Amz-Target", target)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let error: ServiceError = serde_json::from_slice(&bytes).unwrap_or_default();
            let message = if error.kind.is_empty() {
                String::from_utf8_lossy(&bytes).into_owned()
            } else {
                format!("{}: {}", error.kind, error.message)
            };
            return Err(CredentialError::Service {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| CredentialError::Service {
            status: status.as_u16(),
            message: format!("unreadable response: {}", e),
        })
    }

    async fn resolve_identity(&self) -> Result<String, CredentialError> {
        let known = self.identity_id.lock().clone();
        if let Some(id) = known {
            return Ok(id);
        }

        let response: GetIdResponse = self
            .call(
                TARGET_GET_ID,
                &GetIdRequest {
                    identity_pool_id: &self.identity_pool_id,
                },
            )
            .await?;
        let id = response.identity_id.ok_or(CredentialError::MissingField("IdentityId"))?;

        info!("Cognito identity: {}", id);
        *self.identity_id.lock() = Some(id.clone());
        Ok(id)
    }

    async fn fetch(&self) -> Result<Credentials, CredentialError> {
        let identity_id = self.resolve_identity().await?;

        let response: GetCredentialsResponse = self
            .call(
                TARGET_GET_CREDENTIALS,
                &GetCredentialsRequest {
                    identity_id: &identity_id,
                },
            )
            .await?;
        let issued = response.credentials.ok_or(CredentialError::MissingField("Credentials"))?;

        let access_key_id = issued
            .access_key_id
            .ok_or(CredentialError::MissingField("Credentials.AccessKeyId"))?;
        let secret_key = issued
            .secret_key
            .ok_or(CredentialError::MissingField("Credentials.SecretKey"))?;

        let mut credentials = Credentials::new(access_key_id, secret_key, issued.session_token);
        if let Some(expiration) = issued
            .expiration
            .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single())
        {
            credentials = credentials.with_expiration(expiration);
        }

        Ok(credentials)
    }
}

#[async_trait]
impl CredentialProvider for CognitoCredentials {
    async fn credentials(&self) -> iotsockets::Result<Credentials> {
        let margin = chrono::Duration::minutes(REFRESH_MARGIN_MINUTES);
        let cached = self.cached.lock().clone();
        if let Some(cached) = cached {
            if !cached.expires_within(Utc::now(), margin) {
                debug!("Using cached identity-pool credentials");
                return Ok(cached);
            }
        }

        let fresh = self.fetch().await?;
        debug!(expiration = ?fresh.expiration, "Fetched identity-pool credentials");
        *self.cached.lock() = Some(fresh.clone());
        Ok(fresh)
    }
}

/// Static credentials from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`
/// and optionally `AWS_SESSION_TOKEN`
///
/// Read on every call so rotated values are picked up.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
    pub fn new() -> Self {
        Self
    }

    /// Build credentials from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Credentials, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let access_key_id =
            get("AWS_ACCESS_KEY_ID").ok_or_else(|| CredentialError::EnvVarMissing("AWS_ACCESS_KEY_ID".into()))?;
        let secret_access_key = get("AWS_SECRET_ACCESS_KEY")
            .ok_or_else(|| CredentialError::EnvVarMissing("AWS_SECRET_ACCESS_KEY".into()))?;

        Ok(Credentials::new(
            access_key_id,
            secret_access_key,
            get("AWS_SESSION_TOKEN"),
        ))
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentials {
    async fn credentials(&self) -> iotsockets::Result<Credentials> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }
}
