//! Local persistence of the application registration and credential record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use drivegallery_common::{Error, Result};

/// Tag written into every credential record.
pub const AUTHORIZED_USER: &str = "authorized_user";

/// OAuth client registration, read from `credentials.json`.
///
/// Never written by this crate.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
}

/// Layout of a downloaded client registration file. Desktop clients are
/// stored under `installed`, web clients under `web`.
#[derive(Deserialize)]
struct AppRegistration {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    /// Parse a registration file, preferring the `installed` key.
    pub fn from_json(json: &str) -> Result<Self> {
        let registration: AppRegistration = serde_json::from_str(json).map_err(|e| {
            Error::Configuration(format!("Malformed client registration: {}", e))
        })?;

        registration.installed.or(registration.web).ok_or_else(|| {
            Error::Configuration(
                "Client registration has neither an 'installed' nor a 'web' key".to_string(),
            )
        })
    }

    /// Read and parse a registration file.
    ///
    /// # Errors
    /// - File missing or unreadable
    /// - Malformed contents
    pub async fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::Configuration(format!(
                    "Client registration not found at {}",
                    path.display()
                )));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        Self::from_json(&content)
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecret")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Persisted credential record (`token.json`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    #[serde(rename = "type")]
    pub kind: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl StoredCredential {
    /// Combine a client registration with a refresh token.
    pub fn authorized_user(secret: &ClientSecret, refresh_token: impl Into<String>) -> Self {
        Self {
            kind: AUTHORIZED_USER.to_string(),
            client_id: secret.client_id.clone(),
            client_secret: secret.client_secret.clone(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredential")
            .field("kind", &self.kind)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Reads and writes the credential record.
///
/// The record file is the only mutable state; it is overwritten on every
/// save and never locked.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    token_path: PathBuf,
    credentials_path: PathBuf,
}

impl CredentialStore {
    /// Create a store over the given record and registration files.
    pub fn new(token_path: impl Into<PathBuf>, credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            token_path: token_path.into(),
            credentials_path: credentials_path.into(),
        }
    }

    /// Path of the credential record.
    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Path of the client registration.
    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    /// Load the saved credential record.
    ///
    /// # Returns
    /// - `Ok(None)` if the file is absent or cannot be parsed
    ///
    /// # Errors
    /// - The file exists but cannot be read
    pub async fn load(&self) -> Result<Option<StoredCredential>> {
        let content = match fs::read_to_string(&self.token_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        match serde_json::from_str::<StoredCredential>(&content) {
            Ok(record) if record.kind == AUTHORIZED_USER => Ok(Some(record)),
            Ok(record) => {
                tracing::warn!(
                    path = %self.token_path.display(),
                    kind = %record.kind,
                    "Ignoring credential record of unsupported type"
                );
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.token_path.display(),
                    "Ignoring unparseable credential record: {}",
                    e
                );
                Ok(None)
            }
        }
    }

    /// Save a refresh token, merged with the client registration.
    ///
    /// # Postconditions
    /// - The record file is replaced with the combined record
    ///
    /// # Errors
    /// - Client registration missing or malformed
    /// - Write failure
    pub async fn save(&self, refresh_token: &str) -> Result<StoredCredential> {
        let secret = ClientSecret::load(&self.credentials_path).await?;
        let record = StoredCredential::authorized_user(&secret, refresh_token);
        let payload = serde_json::to_string(&record)?;

        if let Some(parent) = self.token_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.token_path, payload).await?;

        tracing::info!(path = %self.token_path.display(), "Saved credential record");

        Ok(record)
    }

    /// Remove the credential record. A missing record is not an error.
    pub async fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.token_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }
}
