//! Credential configuration

use super::AuthError;
use std::path::PathBuf;

/// OAuth2 token endpoint
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Scopes requested for every token
pub const CHAT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/chat.messages",
    "https://www.googleapis.com/auth/chat.spaces",
    "https://www.googleapis.com/auth/chat.memberships",
    "https://www.googleapis.com/auth/chat.spaces.readonly",
    "https://www.googleapis.com/auth/chat.messages.readonly",
    "https://www.googleapis.com/auth/chat.memberships.readonly",
];

/// Raw credential settings, usually read from the environment
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Service account key file (`GOOGLE_APPLICATION_CREDENTIALS`)
    pub credentials_path: Option<PathBuf>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub token_uri: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: None,
            client_id: None,
            client_secret: None,
            refresh_token: None,
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        }
    }
}

/// Which credential flavour will be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    ServiceAccount(PathBuf),
    OAuth {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

impl AuthConfig {
    /// Resolve the credential source.
    ///
    /// An existing service account key file wins over OAuth settings. OAuth
    /// needs all three of client id, secret and refresh token.
    pub fn credential_source(&self) -> Result<CredentialSource, AuthError> {
        if let Some(path) = self.credentials_path.as_ref().filter(|p| p.exists()) {
            return Ok(CredentialSource::ServiceAccount(path.clone()));
        }

        match (
            non_empty(&self.client_id),
            non_empty(&self.client_secret),
            non_empty(&self.refresh_token),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                Ok(CredentialSource::OAuth {
                    client_id,
                    client_secret,
                    refresh_token,
                })
            }
            _ => Err(AuthError::NoCredentials),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn oauth_config() -> AuthConfig {
        AuthConfig {
            client_id: Some("client".into()),
            client_secret: Some("secret".into()),
            refresh_token: Some("refresh".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_credentials() {
        let err = AuthConfig::default().credential_source().unwrap_err();
        assert!(matches!(err, AuthError::NoCredentials));
    }

    #[test]
    fn test_partial_oauth_is_rejected() {
        let config = AuthConfig {
            refresh_token: None,
            ..oauth_config()
        };
        assert!(matches!(
            config.credential_source(),
            Err(AuthError::NoCredentials)
        ));

        let blank = AuthConfig {
            client_secret: Some("  ".into()),
            ..oauth_config()
        };
        assert!(blank.credential_source().is_err());
    }

    #[test]
    fn test_oauth_triple() {
        let source = oauth_config().credential_source().unwrap();
        assert_eq!(
            source,
            CredentialSource::OAuth {
                client_id: "client".into(),
                client_secret: "secret".into(),
                refresh_token: "refresh".into(),
            }
        );
    }

    #[test]
    fn test_service_account_wins_when_file_exists() {
        let key = NamedTempFile::new().unwrap();
        let config = AuthConfig {
            credentials_path: Some(key.path().to_path_buf()),
            ..oauth_config()
        };
        assert_eq!(
            config.credential_source().unwrap(),
            CredentialSource::ServiceAccount(key.path().to_path_buf())
        );
    }

    #[test]
    fn test_missing_key_file_falls_back_to_oauth() {
        let config = AuthConfig {
            credentials_path: Some(PathBuf::from("/nonexistent/key.json")),
            ..oauth_config()
        };
        assert!(matches!(
            config.credential_source().unwrap(),
            CredentialSource::OAuth { .. }
        ));
    }
}
