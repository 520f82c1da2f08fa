use anyhow::{Context, Result};
use std::path::PathBuf;

use drivegallery_storage::gdrive::client::DRIVE_API_BASE;
use drivegallery_storage::AuthConfig;

/// Server configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,
    /// Directory served for paths no route matches.
    pub static_dir: PathBuf,

    // ── Authorization ───────────────────────────────────────────────────
    /// Directory holding `credentials.json` and `token.json`.
    pub data_dir: PathBuf,
    /// Loopback port for the consent callback; 0 picks a free port.
    pub consent_port: u16,

    // ── Drive ───────────────────────────────────────────────────────────
    pub drive_api_base: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(ServerConfig {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: lookup("PORT")
                .unwrap_or_else(|| "8000".into())
                .parse()
                .context("Invalid PORT")?,
            static_dir: lookup("GALLERY_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public")),

            data_dir: lookup("GALLERY_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            consent_port: lookup("GALLERY_CONSENT_PORT")
                .unwrap_or_else(|| "0".into())
                .parse()
                .context("Invalid GALLERY_CONSENT_PORT")?,

            drive_api_base: lookup("GALLERY_DRIVE_API")
                .unwrap_or_else(|| DRIVE_API_BASE.into()),
        })
    }

    /// Address to bind the listener to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Authorization settings derived from this configuration.
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            consent_port: self.consent_port,
            ..AuthConfig::in_dir(&self.data_dir)
        }
    }
}
