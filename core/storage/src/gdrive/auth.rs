//! OAuth2 configuration, tokens and per-request sessions for Google Drive.

use chrono::{DateTime, Duration, Utc};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, ClientId, ClientSecret as OAuthClientSecret, EndpointNotSet, EndpointSet,
    RedirectUrl, RefreshToken, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use drivegallery_common::{Error, Result};

use super::credentials::{ClientSecret, StoredCredential};

/// OAuth2 authorization endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// OAuth2 token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Read-only Drive scope. Listing and viewing never needs write access.
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

/// Application registration file name inside the data directory.
pub const CREDENTIALS_FILE: &str = "credentials.json";
/// Persisted credential record file name inside the data directory.
pub const TOKEN_FILE: &str = "token.json";

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: std::time::Duration = std::time::Duration::from_secs(3600);

/// OAuth client with both the authorization and token endpoints set.
pub(crate) type ConsentClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Configuration for authorization.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Application registration (`credentials.json`), read-only input.
    pub credentials_path: PathBuf,
    /// Credential record (`token.json`), rewritten after each consent.
    pub token_path: PathBuf,
    /// Scopes requested during consent.
    pub scopes: Vec<String>,
    /// Authorization endpoint.
    pub auth_url: String,
    /// Token endpoint, used for code exchange and refresh.
    pub token_url: String,
    /// Loopback port for the consent callback; 0 picks a free port.
    pub consent_port: u16,
    /// How long to wait for the user to finish the consent screen.
    pub consent_timeout: std::time::Duration,
    /// Launch the system browser at the authorization URL.
    pub open_browser: bool,
}

impl AuthConfig {
    /// Configuration with both files inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            credentials_path: dir.join(CREDENTIALS_FILE),
            token_path: dir.join(TOKEN_FILE),
            ..Self::default()
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from(CREDENTIALS_FILE),
            token_path: PathBuf::from(TOKEN_FILE),
            scopes: vec![DRIVE_READONLY_SCOPE.to_string()],
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            consent_port: 0,
            consent_timeout: std::time::Duration::from_secs(300),
            open_browser: true,
        }
    }
}

/// Build an OAuth client for the consent exchange.
pub(crate) fn consent_client(
    secret: &ClientSecret,
    auth_url: &str,
    token_url: &str,
    redirect_url: &str,
) -> Result<ConsentClient> {
    Ok(BasicClient::new(ClientId::new(secret.client_id.clone()))
        .set_client_secret(OAuthClientSecret::new(secret.client_secret.clone()))
        .set_auth_uri(
            AuthUrl::new(auth_url.to_string())
                .map_err(|e| Error::InvalidInput(format!("Invalid auth URL: {}", e)))?,
        )
        .set_token_uri(
            TokenUrl::new(token_url.to_string())
                .map_err(|e| Error::InvalidInput(format!("Invalid token URL: {}", e)))?,
        )
        .set_redirect_uri(
            RedirectUrl::new(redirect_url.to_string())
                .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?,
        ))
}

/// HTTP client for token endpoint calls. Redirects are refused so codes and
/// secrets are never forwarded elsewhere.
pub(crate) fn oauth_http_client() -> Result<oauth2::reqwest::Client> {
    oauth2::reqwest::ClientBuilder::new()
        .redirect(oauth2::reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| Error::Network(format!("Failed to create OAuth HTTP client: {}", e)))
}

/// OAuth2 tokens produced by a consent flow.
#[derive(Clone, Serialize, Deserialize)]
pub struct Tokens {
    /// Access token for API requests.
    pub access_token: String,
    /// Refresh token; only present when offline access was granted.
    pub refresh_token: Option<String>,
    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Check if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        is_near_expiry(self.expires_at)
    }

    pub(crate) fn from_response(response: &BasicTokenResponse) -> Self {
        Self {
            access_token: response.access_token().secret().clone(),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            expires_at: expiry_from(response.expires_in()),
        }
    }
}

impl fmt::Debug for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn is_near_expiry(expires_at: DateTime<Utc>) -> bool {
    // Consider expired if less than 5 minutes remaining
    expires_at < Utc::now() + Duration::minutes(5)
}

fn expiry_from(expires_in: Option<std::time::Duration>) -> DateTime<Utc> {
    let lifetime = expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME);
    Utc::now() + Duration::from_std(lifetime).unwrap_or_else(|_| Duration::hours(1))
}

#[derive(Clone)]
struct AccessToken {
    secret: String,
    expires_at: DateTime<Utc>,
}

/// A request-scoped authorized session.
///
/// Holds the access token for one request and refreshes it through the token
/// endpoint when it is missing or about to expire. Sessions restored from the
/// credential record start without an access token.
pub struct AuthorizedSession {
    client_id: String,
    client_secret: String,
    token_url: String,
    refresh_token: Option<String>,
    access: RwLock<Option<AccessToken>>,
    http: oauth2::reqwest::Client,
}

impl AuthorizedSession {
    /// Restore a session from a persisted credential record.
    pub(crate) fn restore(
        record: &StoredCredential,
        token_url: &str,
        http: oauth2::reqwest::Client,
    ) -> Self {
        Self {
            client_id: record.client_id.clone(),
            client_secret: record.client_secret.clone(),
            token_url: token_url.to_string(),
            refresh_token: Some(record.refresh_token.clone()),
            access: RwLock::new(None),
            http,
        }
    }

    /// Create a session from freshly issued tokens.
    pub(crate) fn from_tokens(
        secret: &ClientSecret,
        tokens: Tokens,
        token_url: &str,
        http: oauth2::reqwest::Client,
    ) -> Self {
        Self {
            client_id: secret.client_id.clone(),
            client_secret: secret.client_secret.clone(),
            token_url: token_url.to_string(),
            refresh_token: tokens.refresh_token,
            access: RwLock::new(Some(AccessToken {
                secret: tokens.access_token,
                expires_at: tokens.expires_at,
            })),
            http,
        }
    }

    /// The refresh token, if the session carries one.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Get a valid access token, refreshing if necessary.
    ///
    /// # Errors
    /// - No refresh token available once the access token expired
    /// - Token refresh failed
    pub async fn access_token(&self) -> Result<String> {
        {
            let access = self.access.read().await;
            if let Some(token) = access.as_ref().filter(|t| !is_near_expiry(t.expires_at)) {
                return Ok(token.secret.clone());
            }
        }

        let mut access = self.access.write().await;

        // Double-check after acquiring write lock
        if let Some(token) = access.as_ref().filter(|t| !is_near_expiry(t.expires_at)) {
            return Ok(token.secret.clone());
        }

        let refresh_token = self.refresh_token.as_deref().ok_or_else(|| {
            Error::Authentication(
                "Access token expired and no refresh token is available".to_string(),
            )
        })?;

        tracing::debug!("Refreshing access token");

        let fresh = self.refresh(refresh_token).await?;
        let secret = fresh.secret.clone();
        *access = Some(fresh);

        Ok(secret)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AccessToken> {
        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(OAuthClientSecret::new(self.client_secret.clone()))
            .set_token_uri(
                TokenUrl::new(self.token_url.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid token URL: {}", e)))?,
            );

        let response = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| Error::Authentication(format!("Token refresh failed: {}", e)))?;

        Ok(AccessToken {
            secret: response.access_token().secret().clone(),
            expires_at: expiry_from(response.expires_in()),
        })
    }
}

impl fmt::Debug for AuthorizedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedSession")
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Form, Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    pub(crate) fn test_secret() -> ClientSecret {
        ClientSecret {
            client_id: "test_id".to_string(),
            client_secret: "test_secret".to_string(),
        }
    }

    /// A session with a long-lived access token and no refresh capability.
    pub(crate) fn session_with_access_token(token: &str) -> AuthorizedSession {
        let tokens = Tokens {
            access_token: token.to_string(),
            refresh_token: None,
            expires_at: Utc::now() + Duration::hours(1),
        };
        AuthorizedSession::from_tokens(
            &test_secret(),
            tokens,
            GOOGLE_TOKEN_URL,
            oauth_http_client().unwrap(),
        )
    }

    pub(crate) type SeenForms = Arc<Mutex<Vec<HashMap<String, String>>>>;

    /// Serve a token endpoint on loopback that records submitted forms.
    async fn spawn_token_endpoint() -> (String, SeenForms) {
        spawn_token_endpoint_with(serde_json::json!({
            "access_token": "fresh_access",
            "token_type": "Bearer",
            "expires_in": 3599
        }))
        .await
    }

    /// Serve a token endpoint that answers every request with `body`.
    pub(crate) async fn spawn_token_endpoint_with(body: serde_json::Value) -> (String, SeenForms) {
        let seen: SeenForms = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let app = Router::new().route(
            "/token",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let recorder = recorder.clone();
                let body = body.clone();
                async move {
                    recorder.lock().unwrap().push(form);
                    Json(body)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/token", addr), seen)
    }

    #[test]
    fn test_tokens_expiration() {
        let tokens = Tokens {
            access_token: "test".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Utc::now() - Duration::hours(1),
        };

        assert!(tokens.is_expired());

        let valid_tokens = Tokens {
            access_token: "test".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + Duration::hours(1),
        };

        assert!(!valid_tokens.is_expired());
    }

    #[test]
    fn test_tokens_near_expiration() {
        // Token expiring in 4 minutes should be considered expired (5 min buffer)
        let tokens = Tokens {
            access_token: "test".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + Duration::minutes(4),
        };

        assert!(tokens.is_expired());
    }

    #[test]
    fn test_tokens_debug_redacts_secrets() {
        let tokens = Tokens {
            access_token: "very-secret-access".to_string(),
            refresh_token: Some("very-secret-refresh".to_string()),
            expires_at: Utc::now(),
        };

        let debug = format!("{:?}", tokens);
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_auth_config_in_dir() {
        let config = AuthConfig::in_dir("/srv/gallery");

        assert_eq!(config.credentials_path, PathBuf::from("/srv/gallery/credentials.json"));
        assert_eq!(config.token_path, PathBuf::from("/srv/gallery/token.json"));
        assert_eq!(config.scopes, vec![DRIVE_READONLY_SCOPE.to_string()]);
        assert_eq!(config.token_url, GOOGLE_TOKEN_URL);
    }

    #[test]
    fn test_consent_client_rejects_bad_redirect() {
        let result = consent_client(&test_secret(), GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, "not a url");
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_access_token_uses_current_token() {
        let session = session_with_access_token("current");
        assert_eq!(session.access_token().await.unwrap(), "current");
    }

    #[tokio::test]
    async fn test_restored_session_refreshes_on_first_use() {
        let (token_url, seen) = spawn_token_endpoint().await;
        let record = StoredCredential::authorized_user(&test_secret(), "stored_refresh");
        let session = AuthorizedSession::restore(&record, &token_url, oauth_http_client().unwrap());

        assert_eq!(session.refresh_token(), Some("stored_refresh"));
        assert_eq!(session.access_token().await.unwrap(), "fresh_access");
        // Second call reuses the refreshed token
        assert_eq!(session.access_token().await.unwrap(), "fresh_access");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].get("grant_type").map(String::as_str), Some("refresh_token"));
        assert_eq!(seen[0].get("refresh_token").map(String::as_str), Some("stored_refresh"));
    }

    #[tokio::test]
    async fn test_expired_session_without_refresh_token_fails() {
        let tokens = Tokens {
            access_token: "stale".to_string(),
            refresh_token: None,
            expires_at: Utc::now() - Duration::hours(1),
        };
        let session = AuthorizedSession::from_tokens(
            &test_secret(),
            tokens,
            GOOGLE_TOKEN_URL,
            oauth_http_client().unwrap(),
        );

        let result = session.access_token().await;
        assert!(matches!(result, Err(Error::Authentication(_))));
    }
}
