//! Per-request authorization: restore from disk or run consent.

use std::sync::Arc;
use tokio::sync::Mutex;

use drivegallery_common::Result;

use super::auth::{oauth_http_client, AuthConfig, AuthorizedSession};
use super::consent::{ConsentFlow, LoopbackConsent};
use super::credentials::{ClientSecret, CredentialStore};

/// Produces an authorized session for each request.
///
/// Nothing is cached between calls: every `authorize` re-reads the credential
/// record from disk. Consent runs are serialized so concurrent first-time
/// requests share one browser round-trip.
pub struct Authorizer {
    config: AuthConfig,
    store: CredentialStore,
    consent: Arc<dyn ConsentFlow>,
    consent_gate: Mutex<()>,
    http: oauth2::reqwest::Client,
}

impl Authorizer {
    /// Create an authorizer using the given consent flow.
    pub fn new(config: AuthConfig, consent: Arc<dyn ConsentFlow>) -> Result<Self> {
        let store = CredentialStore::new(&config.token_path, &config.credentials_path);

        Ok(Self {
            config,
            store,
            consent,
            consent_gate: Mutex::new(()),
            http: oauth_http_client()?,
        })
    }

    /// Create an authorizer that runs the browser-based loopback consent.
    pub fn loopback(config: AuthConfig) -> Result<Self> {
        let consent = Arc::new(LoopbackConsent::new(&config)?);
        Self::new(config, consent)
    }

    /// The credential store this authorizer reads and writes.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Get an authorized session.
    ///
    /// # Postconditions
    /// - With a saved credential record, returns without network or user
    ///   interaction
    /// - Otherwise runs the consent flow and saves the refresh token it
    ///   yields, if any
    ///
    /// # Errors
    /// - Credential record unreadable
    /// - Client registration missing or malformed
    /// - Consent denied or failed
    pub async fn authorize(&self) -> Result<AuthorizedSession> {
        if let Some(session) = self.restore().await? {
            return Ok(session);
        }

        let _gate = self.consent_gate.lock().await;

        // Another request may have finished consent while we waited
        if let Some(session) = self.restore().await? {
            return Ok(session);
        }

        let secret = ClientSecret::load(&self.config.credentials_path).await?;

        tracing::info!("No saved credentials, starting interactive consent");

        let tokens = self
            .consent
            .obtain_tokens(&secret, &self.config.scopes)
            .await
            .inspect_err(|e| tracing::warn!("Interactive consent failed: {}", e))?;

        let session = AuthorizedSession::from_tokens(
            &secret,
            tokens,
            &self.config.token_url,
            self.http.clone(),
        );

        match session.refresh_token() {
            Some(refresh_token) => {
                self.store.save(refresh_token).await?;
            }
            None => tracing::warn!("Consent returned no refresh token; credentials not saved"),
        }

        Ok(session)
    }

    /// Restore a session from the saved credential record, if one exists.
    ///
    /// Never starts consent.
    pub async fn restore(&self) -> Result<Option<AuthorizedSession>> {
        let record = self.store.load().await?;

        Ok(record.map(|record| {
            tracing::debug!("Restored session from saved credentials");
            AuthorizedSession::restore(&record, &self.config.token_url, self.http.clone())
        }))
    }
}
