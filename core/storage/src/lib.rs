//! Google Drive access for Drive Gallery.
//!
//! This module provides a trait-based interface over the remote drive
//! (a real Google Drive client and an in-memory drive for tests and demos)
//! together with the authorization pieces every request goes through:
//! the credential store, the interactive consent flow and the authorizer.
//!
//! # Design Principles
//! - Read-only: the drive is only ever listed and downloaded from
//! - Per-request sessions: nothing about authorization is cached in memory
//! - Explicit configuration: paths and endpoints arrive through `AuthConfig`

pub mod gdrive;
pub mod memory;
pub mod provider;

pub use gdrive::{
    AuthConfig, AuthorizedSession, Authorizer, ClientSecret, ConsentFlow, CredentialStore,
    DriveClient, LoopbackConsent, StoredCredential, Tokens,
};
pub use memory::MemoryDrive;
pub use provider::{ByteStream, DriveApi, ImageContent, ImageQuery};
