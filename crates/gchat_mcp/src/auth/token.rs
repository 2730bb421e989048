//! Token sources: service account (JWT bearer) and OAuth2 refresh token
//!
//! Both are one form POST to the token endpoint. Uses raw HTTP requests, no
//! Google SDK.

use super::{AccessToken, AuthError, TokenSource, CHAT_SCOPES, DEFAULT_TOKEN_URI};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Token endpoint success body
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Token endpoint error body
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

async fn request_token(
    http: &reqwest::Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<AccessToken, AuthError> {
    debug!("Requesting access token from {}", token_uri);

    let response = http
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| AuthError::Refresh(format!("token endpoint unreachable: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => match err.error_description {
                Some(description) => format!("{} - {}", err.error, description),
                None => err.error,
            },
            Err(_) => format!("HTTP {}", status),
        };
        return Err(AuthError::Refresh(reason));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| AuthError::Refresh(format!("malformed token response: {}", e)))?;

    Ok(AccessToken::new(token.access_token, token.expires_in))
}

// ============================================================================
// Service account
// ============================================================================

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Service account key file credentials
pub struct ServiceAccountSource {
    client_email: String,
    signing_key: EncodingKey,
    token_uri: String,
    http: reqwest::Client,
}

impl ServiceAccountSource {
    /// Load and validate a key file. The private key is parsed eagerly so a
    /// bad file fails at startup rather than on the first tool call.
    pub fn from_file(path: &Path, http: reqwest::Client) -> Result<Self, AuthError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AuthError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw, http)
    }

    pub fn from_json(raw: &str, http: reqwest::Client) -> Result<Self, AuthError> {
        let key: ServiceAccountKey = serde_json::from_str(raw)
            .map_err(|e| AuthError::Credentials(format!("invalid service account key: {}", e)))?;

        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| AuthError::Credentials(format!("invalid private key: {}", e)))?;

        Ok(Self {
            client_email: key.client_email,
            signing_key,
            token_uri: key
                .token_uri
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            http,
        })
    }

    fn assertion(&self) -> Result<String, AuthError> {
        let iat = Utc::now().timestamp();
        let claims = JwtClaims {
            iss: &self.client_email,
            scope: CHAT_SCOPES.join(" "),
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| AuthError::Credentials(format!("failed to sign assertion: {}", e)))
    }
}

#[async_trait]
impl TokenSource for ServiceAccountSource {
    fn kind(&self) -> &'static str {
        "service account"
    }

    async fn fetch(&self) -> Result<AccessToken, AuthError> {
        let assertion = self.assertion()?;
        let token = request_token(
            &self.http,
            &self.token_uri,
            &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
        )
        .await?;

        info!("Obtained access token for {}", self.client_email);
        Ok(token)
    }
}

// ============================================================================
// OAuth2 refresh token
// ============================================================================

/// OAuth2 installed-app credentials with a long-lived refresh token
pub struct RefreshTokenSource {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token_uri: String,
    http: reqwest::Client,
}

impl RefreshTokenSource {
    pub fn new(
        client_id: String,
        client_secret: String,
        refresh_token: String,
        token_uri: String,
        http: reqwest::Client,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            refresh_token,
            token_uri,
            http,
        }
    }
}

#[async_trait]
impl TokenSource for RefreshTokenSource {
    fn kind(&self) -> &'static str {
        "OAuth2"
    }

    async fn fetch(&self) -> Result<AccessToken, AuthError> {
        request_token(
            &self.http,
            &self.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_account_rejects_malformed_json() {
        let err = ServiceAccountSource::from_json("{not json", reqwest::Client::new())
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::Credentials(_)));
    }

    #[test]
    fn test_service_account_rejects_bad_private_key() {
        let raw = r#"{
            "type": "service_account",
            "client_email": "bot@test-project.iam.gserviceaccount.com",
            "private_key": "not a pem block"
        }"#;
        let err = ServiceAccountSource::from_json(raw, reqwest::Client::new())
            .err()
            .unwrap();
        assert!(err.to_string().contains("invalid private key"));
    }

    #[test]
    fn test_service_account_missing_file() {
        let err = ServiceAccountSource::from_file(
            Path::new("/nonexistent/service-account.json"),
            reqwest::Client::new(),
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_token_error_body_parses() {
        let body = r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#;
        let parsed: TokenErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error, "invalid_grant");
        assert_eq!(
            parsed.error_description.as_deref(),
            Some("Token has been expired or revoked.")
        );
    }
}
