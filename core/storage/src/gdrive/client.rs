//! Google Drive API client.

use async_trait::async_trait;
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;

use drivegallery_common::{Error, FileEntry, FolderEntry, ImagePage, Result};

use crate::gdrive::auth::AuthorizedSession;
use crate::provider::{is_image_mime_type, DriveApi, ImageContent, ImageQuery};

/// Google Drive API base URL.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Folder listings are capped at this many entries.
pub const FOLDER_PAGE_SIZE: u32 = 10;

/// Fields requested for every listing.
const LIST_FIELDS: &str = "nextPageToken, files(id, name)";

/// Response from listing files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse<T> {
    #[serde(default = "Vec::new")]
    files: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Escape a value for use inside a single-quoted Drive query literal.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Query selecting folders.
pub fn folder_query() -> String {
    format!("mimeType='{}' and trashed = false", FOLDER_MIME_TYPE)
}

/// Query selecting images, optionally only direct children of `parent`.
pub fn image_query(parent: Option<&str>) -> String {
    let mut clauses = vec!["mimeType contains 'image/'".to_string()];
    if let Some(parent) = parent {
        clauses.push(format!("'{}' in parents", escape_query_value(parent)));
    }
    clauses.push("trashed = false".to_string());
    clauses.join(" and ")
}

/// Google Drive API client.
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: Client,
    api_base: String,
}

impl DriveClient {
    /// Create a client against `api_base` (trailing slashes are ignored).
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("DriveGallery/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client against the public Drive v3 API.
    pub fn google() -> Result<Self> {
        Self::new(DRIVE_API_BASE)
    }

    /// Get authorization header.
    async fn auth_header(&self, session: &AuthorizedSession) -> Result<String> {
        let token = session.access_token().await?;
        Ok(format!("Bearer {}", token))
    }

    /// Issue one `files.list` request.
    async fn list<T: serde::de::DeserializeOwned>(
        &self,
        session: &AuthorizedSession,
        params: &[(&str, &str)],
    ) -> Result<FileListResponse<T>> {
        let url = format!("{}/files", self.api_base);
        let auth = self.auth_header(session).await?;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(params)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to list files: {}", e)))?;

        self.handle_response(response).await
    }

    /// Handle API response with error checking.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if status.is_success() {
            Ok(response)
        } else if status == StatusCode::NOT_FOUND {
            Err(Error::NotFound("Resource not found".to_string()))
        } else if status == StatusCode::UNAUTHORIZED {
            Err(Error::Authentication(
                "Invalid or expired token".to_string(),
            ))
        } else if status == StatusCode::FORBIDDEN {
            Err(Error::PermissionDenied("Access denied".to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Network(format!("API error: {} - {}", status, body)))
        }
    }
}

#[async_trait]
impl DriveApi for DriveClient {
    fn name(&self) -> &str {
        "gdrive"
    }

    async fn list_folders(&self, session: &AuthorizedSession) -> Result<Vec<FolderEntry>> {
        let query = folder_query();
        let page_size = FOLDER_PAGE_SIZE.to_string();

        let response: FileListResponse<FolderEntry> = self
            .list(
                session,
                &[
                    ("q", query.as_str()),
                    ("pageSize", page_size.as_str()),
                    ("fields", LIST_FIELDS),
                ],
            )
            .await?;

        tracing::debug!(count = response.files.len(), "Listed folders");

        Ok(response.files)
    }

    async fn list_images(
        &self,
        session: &AuthorizedSession,
        query: &ImageQuery,
    ) -> Result<ImagePage> {
        let q = image_query(query.folder.as_ref().map(|f| f.as_str()));

        let mut params = vec![("q", q.as_str()), ("fields", LIST_FIELDS)];
        if let Some(token) = &query.page_token {
            params.push(("pageToken", token.as_str()));
        }

        let response: FileListResponse<FileEntry> = self.list(session, &params).await?;

        tracing::debug!(
            count = response.files.len(),
            folder = ?query.folder,
            more = response.next_page_token.is_some(),
            "Listed images"
        );

        Ok(ImagePage {
            files: response.files,
            next_page_token: response.next_page_token,
        })
    }

    async fn download_image(
        &self,
        session: &AuthorizedSession,
        file_id: &str,
    ) -> Result<ImageContent> {
        if file_id.is_empty() {
            return Err(Error::InvalidInput("File id cannot be empty".to_string()));
        }

        let url = format!(
            "{}/files/{}",
            self.api_base,
            utf8_percent_encode(file_id, NON_ALPHANUMERIC)
        );
        let auth = self.auth_header(session).await?;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to start download: {}", e)))?;

        let response = Self::check_status(response).await?;

        let mime_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        if !is_image_mime_type(&mime_type) {
            tracing::warn!(file_id, mime_type = %mime_type, "Refusing to serve non-image content");
            return Err(Error::NotFound(format!("Not an image: {}", file_id)));
        }

        let stream = response
            .bytes_stream()
            .map(|result| result.map_err(|e| Error::Network(format!("Stream read error: {}", e))));

        Ok(ImageContent {
            mime_type,
            stream: Box::pin(stream),
        })
    }
}
