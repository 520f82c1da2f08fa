//! Google Drive backend for Drive Gallery.
//!
//! This module provides:
//! - The credential store for `credentials.json` and `token.json`
//! - A loopback OAuth2 consent flow with PKCE
//! - Request-scoped sessions with on-demand token refresh
//! - A read-only Drive v3 client

pub mod auth;
pub mod authorizer;
pub mod client;
pub mod consent;
pub mod credentials;

pub use auth::{AuthConfig, AuthorizedSession, Tokens, DRIVE_READONLY_SCOPE};
pub use authorizer::Authorizer;
pub use client::DriveClient;
pub use consent::{ConsentFlow, LoopbackConsent};
pub use credentials::{ClientSecret, CredentialStore, StoredCredential};
