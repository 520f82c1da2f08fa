//! Interactive consent through a loopback redirect.
//!
//! The user is sent to the authorization endpoint in their browser; the
//! provider redirects back to a short-lived listener on 127.0.0.1 which hands
//! the authorization code to the waiting flow.

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use oauth2::url::Url;
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier, Scope};
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use drivegallery_common::{Error, Result};

use super::auth::{consent_client, oauth_http_client, AuthConfig, ConsentClient, Tokens};
use super::credentials::ClientSecret;

/// Path the provider redirects back to.
pub const CALLBACK_PATH: &str = "/oauth2callback";

/// Grace period for the callback listener to finish its last response.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A user-driven authorization exchange producing tokens.
#[async_trait]
pub trait ConsentFlow: Send + Sync {
    /// Run the flow to completion.
    ///
    /// # Errors
    /// - User denied access
    /// - Timeout or network errors during the exchange
    async fn obtain_tokens(&self, secret: &ClientSecret, scopes: &[String]) -> Result<Tokens>;
}

/// Consent flow that opens the browser and listens on loopback for the
/// redirect.
pub struct LoopbackConsent {
    auth_url: String,
    token_url: String,
    port: u16,
    timeout: Duration,
    open_browser: bool,
    http: oauth2::reqwest::Client,
}

impl LoopbackConsent {
    /// Create a loopback flow from the endpoint and callback settings.
    pub fn new(config: &AuthConfig) -> Result<Self> {
        Ok(Self {
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            port: config.consent_port,
            timeout: config.consent_timeout,
            open_browser: config.open_browser,
            http: oauth_http_client()?,
        })
    }

    /// Serve the callback route until one decisive callback arrives.
    async fn await_code(&self, listener: TcpListener, expected_state: String) -> Result<String> {
        let (code_tx, code_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = callback_router(expected_state, code_tx);

        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let outcome = tokio::time::timeout(self.timeout, code_rx).await;

        let _ = shutdown_tx.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => tracing::warn!("Consent callback listener failed: {}", e),
            Ok(Err(e)) => tracing::warn!("Consent callback listener task failed: {}", e),
            Err(_) => server.abort(),
        }

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Authentication(
                "Consent callback closed before completing".to_string(),
            )),
            Err(_) => Err(Error::Authentication(format!(
                "Consent not completed within {} seconds",
                self.timeout.as_secs()
            ))),
        }
    }

    /// Open the system browser at the authorization URL, if enabled.
    fn launch_browser(&self, url: &Url) {
        if self.open_browser {
            if let Err(e) = open::that_detached(url.as_str()) {
                tracing::warn!("Could not open a browser ({}); open the URL above manually", e);
            }
        }
    }

    /// Run the consent exchange on an already bound listener.
    ///
    /// `launch` receives the authorization URL once the callback route is
    /// about to be served.
    async fn run_on(
        &self,
        listener: TcpListener,
        secret: &ClientSecret,
        scopes: &[String],
        launch: impl FnOnce(&Url) + Send,
    ) -> Result<Tokens> {
        let port = listener.local_addr()?.port();
        let redirect_url = format!("http://127.0.0.1:{}{}", port, CALLBACK_PATH);

        let client = consent_client(secret, &self.auth_url, &self.token_url, &redirect_url)?;
        let (url, csrf_token, verifier) = authorization_request(&client, scopes);

        tracing::info!("Authorize this app by visiting: {}", url);
        launch(&url);

        let code = self.await_code(listener, csrf_token.secret().clone()).await?;

        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(verifier)
            .request_async(&self.http)
            .await
            .map_err(|e| Error::Authentication(format!("Token exchange failed: {}", e)))?;

        tracing::info!("Consent granted");

        Ok(Tokens::from_response(&response))
    }
}

#[async_trait]
impl ConsentFlow for LoopbackConsent {
    async fn obtain_tokens(&self, secret: &ClientSecret, scopes: &[String]) -> Result<Tokens> {
        let listener = TcpListener::bind(("127.0.0.1", self.port)).await?;
        self.run_on(listener, secret, scopes, |url| self.launch_browser(url))
            .await
    }
}

/// Build the authorization URL with offline access and a PKCE challenge.
///
/// Returns the URL, the CSRF token expected back in `state`, and the PKCE
/// verifier for the code exchange.
pub(crate) fn authorization_request(
    client: &ConsentClient,
    scopes: &[String],
) -> (Url, CsrfToken, PkceCodeVerifier) {
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (url, csrf_token) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(scopes.iter().cloned().map(Scope::new))
        .set_pkce_challenge(challenge)
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .url();

    (url, csrf_token, verifier)
}

type CodeSender = oneshot::Sender<Result<String>>;

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    sender: Arc<Mutex<Option<CodeSender>>>,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

fn callback_router(expected_state: String, sender: CodeSender) -> Router {
    let state = CallbackState {
        expected_state: expected_state.into(),
        sender: Arc::new(Mutex::new(Some(sender))),
    };

    Router::new()
        .route(CALLBACK_PATH, get(handle_callback))
        .fallback(|| async { "Invalid callback URL" })
        .with_state(state)
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> &'static str {
    let (outcome, reply) = evaluate_callback(params, &state.expected_state);

    let sender = state.sender.lock().ok().and_then(|mut slot| slot.take());
    match sender {
        Some(sender) => {
            let _ = sender.send(outcome);
            reply
        }
        None => "Authorization already handled.",
    }
}

fn evaluate_callback(
    params: CallbackParams,
    expected_state: &str,
) -> (Result<String>, &'static str) {
    if let Some(error) = params.error {
        return (Err(Error::ConsentDenied(error)), "Authorization rejected.");
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return (
            Err(Error::Authentication("Cannot read authentication code".to_string())),
            "No authentication code provided.",
        );
    };

    if params.state.as_deref() != Some(expected_state) {
        return (
            Err(Error::Authentication("State parameter mismatch".to_string())),
            "Invalid state parameter.",
        );
    }

    (Ok(code), "Authentication successful! Please return to the console.")
}
