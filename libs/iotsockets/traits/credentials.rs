use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

/// Short-lived credential triple used to presign a connection
///
/// The secret key and session token are never printed: the `Debug`
/// implementation redacts them.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    /// When the issuer says these credentials stop working
    pub expiration: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Create a credential triple without an expiration
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
            expiration: None,
        }
    }

    /// Attach an expiration instant
    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Both key halves are present
    pub fn is_complete(&self) -> bool {
        !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
    }

    /// Expired, or expiring within `margin` of `now`
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expiration
            .map(|exp| exp - margin <= now)
            .unwrap_or(false)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Trait for acquiring signing credentials
///
/// Called once per connection attempt, so every attempt signs with
/// whatever the provider considers current. Caching and refresh policy
/// belong to the implementation.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Get a credential triple for the next connection attempt
    ///
    /// # Returns
    /// * `Ok(credentials)` - Use these to sign the connection URL
    /// * `Err(IotSocketError::Credentials)` - Acquisition failed; the attempt is aborted
    async fn credentials(&self) -> Result<Credentials>;
}

/// A provider that always returns the same credentials
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credentials(&self) -> Result<Credentials> {
        Ok(self.credentials.clone())
    }
}
