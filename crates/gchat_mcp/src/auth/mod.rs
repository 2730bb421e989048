//! Authentication session shared by every tool category
//!
//! The dispatcher only needs two things from authentication:
//!
//! - [`Authenticator::ensure_authenticated`]: make sure a usable access token
//!   exists, fetching or refreshing one if needed
//! - [`Authenticator::client`]: an API client bound to the current token
//!
//! [`AuthSession`] is the production implementation. Tests substitute a fake
//! that hands out an in-memory [`ChatApi`].

mod config;
mod token;

pub use config::{AuthConfig, CredentialSource, CHAT_SCOPES, DEFAULT_TOKEN_URI};
pub use token::{RefreshTokenSource, ServiceAccountSource};

use crate::api::{ChatApi, RestChatClient};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Tokens are refreshed this long before their stated expiry
const EXPIRY_SKEW_SECS: i64 = 60;

/// Authentication failures
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error(
        "No valid authentication method found. Provide either a service account key file \
         or OAuth2 client id, client secret and refresh token."
    )]
    NoCredentials,

    #[error("Authentication not initialized. Call ensure_authenticated() first.")]
    NotInitialized,

    #[error("Invalid credentials: {0}")]
    Credentials(String),

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error("Authentication timed out after {0}s")]
    TimedOut(u64),
}

/// A bearer token and its expiry (if the issuer stated one)
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub secret: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_in_secs: Option<i64>) -> Self {
        Self {
            secret: secret.into(),
            expires_at: expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }

    /// Whether the token is still usable at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(EXPIRY_SKEW_SECS) < expires_at,
            None => true,
        }
    }
}

/// Something that can mint access tokens (one network round trip)
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Human-readable name for logs
    fn kind(&self) -> &'static str;

    async fn fetch(&self) -> Result<AccessToken, AuthError>;
}

/// Contract consumed by the tool categories
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Idempotent; refreshes an expired token or performs the first login.
    async fn ensure_authenticated(&self) -> Result<(), AuthError>;

    /// Client bound to the current token.
    ///
    /// Fails with [`AuthError::NotInitialized`] before the first successful
    /// `ensure_authenticated`.
    fn client(&self) -> Result<Arc<dyn ChatApi>, AuthError>;
}

/// Authenticator for catalog-only use (listing tools without credentials).
///
/// Every tool that needs the API fails with [`AuthError::NoCredentials`].
pub struct Unauthenticated;

#[async_trait]
impl Authenticator for Unauthenticated {
    async fn ensure_authenticated(&self) -> Result<(), AuthError> {
        Err(AuthError::NoCredentials)
    }

    fn client(&self) -> Result<Arc<dyn ChatApi>, AuthError> {
        Err(AuthError::NotInitialized)
    }
}

/// Production authenticator
///
/// Concurrent `ensure_authenticated` callers serialize on `token`: the first
/// one performs the fetch while the rest wait, then observe the fresh token
/// and return without a second round trip.
pub struct AuthSession {
    source: Arc<dyn TokenSource>,
    http: reqwest::Client,
    api_base_url: String,
    token: Mutex<Option<AccessToken>>,
    client: RwLock<Option<Arc<dyn ChatApi>>>,
}

impl AuthSession {
    pub fn new(
        source: Arc<dyn TokenSource>,
        http: reqwest::Client,
        api_base_url: impl Into<String>,
    ) -> Self {
        Self {
            source,
            http,
            api_base_url: api_base_url.into(),
            token: Mutex::new(None),
            client: RwLock::new(None),
        }
    }

    /// Pick a token source from configuration.
    pub fn from_config(
        config: &AuthConfig,
        http: reqwest::Client,
        api_base_url: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let source: Arc<dyn TokenSource> = match config.credential_source()? {
            CredentialSource::ServiceAccount(path) => Arc::new(ServiceAccountSource::from_file(
                &path,
                http.clone(),
            )?),
            CredentialSource::OAuth {
                client_id,
                client_secret,
                refresh_token,
            } => Arc::new(RefreshTokenSource::new(
                client_id,
                client_secret,
                refresh_token,
                config.token_uri.clone(),
                http.clone(),
            )),
        };

        info!("Using {} authentication", source.kind());
        Ok(Self::new(source, http, api_base_url))
    }
}

#[async_trait]
impl Authenticator for AuthSession {
    async fn ensure_authenticated(&self) -> Result<(), AuthError> {
        let mut token = self.token.lock().await;

        if let Some(current) = token.as_ref() {
            if current.is_fresh(Utc::now()) {
                return Ok(());
            }
            debug!("Access token expired, refreshing");
        }

        let fresh = self.source.fetch().await?;
        let client: Arc<dyn ChatApi> = Arc::new(RestChatClient::new(
            self.http.clone(),
            self.api_base_url.clone(),
            fresh.secret.clone(),
        ));

        *self.client.write().unwrap_or_else(PoisonError::into_inner) = Some(client);
        *token = Some(fresh);

        debug!("Credentials refreshed successfully");
        Ok(())
    }

    fn client(&self) -> Result<Arc<dyn ChatApi>, AuthError> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(AuthError::NotInitialized)
    }
}
