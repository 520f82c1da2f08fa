//! Drive provider trait definition.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::fmt;
use std::pin::Pin;

use drivegallery_common::{FolderEntry, FolderId, ImagePage, Result};

use crate::gdrive::AuthorizedSession;

/// Byte stream type for download operations.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Parameters of an image listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageQuery {
    /// Restrict the listing to direct children of this folder.
    pub folder: Option<FolderId>,
    /// Continuation token from a previous page.
    pub page_token: Option<String>,
}

impl ImageQuery {
    /// Images anywhere in the drive.
    pub fn all() -> Self {
        Self::default()
    }

    /// Images directly inside `folder`.
    pub fn in_folder(folder: FolderId) -> Self {
        Self {
            folder: Some(folder),
            page_token: None,
        }
    }

    /// Continue from `token`; empty tokens are ignored.
    pub fn with_page_token(mut self, token: Option<String>) -> Self {
        self.page_token = token.filter(|t| !t.is_empty());
        self
    }
}

/// Whether `mime_type` names an image (`image/*`, parameters allowed).
pub fn is_image_mime_type(mime_type: &str) -> bool {
    mime_type
        .trim_start()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

/// Downloaded image content.
pub struct ImageContent {
    /// Content type reported by the remote.
    pub mime_type: String,
    /// Image bytes.
    pub stream: ByteStream,
}

impl fmt::Debug for ImageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageContent")
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// Read-only drive operations used by the gallery.
///
/// Every operation takes the session of the request that issued it; an
/// implementation must not keep sessions beyond the call.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Get the provider name (e.g., "gdrive", "memory").
    fn name(&self) -> &str;

    /// List folders, at most ten.
    ///
    /// # Returns
    /// An empty vector when the drive has no folders.
    ///
    /// # Errors
    /// - Authentication errors
    /// - Network errors
    async fn list_folders(&self, session: &AuthorizedSession) -> Result<Vec<FolderEntry>>;

    /// List one page of images.
    ///
    /// Only items with an `image/*` MIME type are returned. When
    /// `query.folder` is set, only its direct children are returned.
    async fn list_images(
        &self,
        session: &AuthorizedSession,
        query: &ImageQuery,
    ) -> Result<ImagePage>;

    /// Download the content of a single image.
    ///
    /// # Errors
    /// - File not found
    /// - Authentication errors
    async fn download_image(&self, session: &AuthorizedSession, file_id: &str)
        -> Result<ImageContent>;
}
