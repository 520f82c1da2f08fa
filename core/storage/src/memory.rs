//! In-memory drive for testing.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use std::sync::{Arc, RwLock};

use drivegallery_common::{Error, FileEntry, FolderEntry, ImagePage, Result};

use crate::gdrive::client::FOLDER_PAGE_SIZE;
use crate::gdrive::AuthorizedSession;
use crate::provider::{is_image_mime_type, DriveApi, ImageContent, ImageQuery};

#[derive(Debug, Clone)]
struct StoredImage {
    entry: FileEntry,
    parent: Option<String>,
    mime_type: String,
    data: Bytes,
}

#[derive(Debug, Default)]
struct Contents {
    folders: Vec<FolderEntry>,
    images: Vec<StoredImage>,
}

/// In-memory drive.
///
/// Useful for testing and development. Never touches the session, so it works
/// with credentials that could not be refreshed. Listings return everything on
/// one page.
#[derive(Debug, Clone, Default)]
pub struct MemoryDrive {
    contents: Arc<RwLock<Contents>>,
}

impl MemoryDrive {
    /// Create a new empty memory drive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a folder.
    pub fn add_folder(&self, id: &str, name: &str) {
        self.write().folders.push(FolderEntry {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    /// Add an image, optionally inside a folder.
    pub fn add_image(
        &self,
        id: &str,
        name: &str,
        parent: Option<&str>,
        mime_type: &str,
        data: impl Into<Bytes>,
    ) {
        self.write().images.push(StoredImage {
            entry: FileEntry {
                id: id.to_string(),
                name: name.to_string(),
            },
            parent: parent.map(str::to_string),
            mime_type: mime_type.to_string(),
            data: data.into(),
        });
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Contents> {
        self.contents.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Contents> {
        self.contents.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DriveApi for MemoryDrive {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_folders(&self, _session: &AuthorizedSession) -> Result<Vec<FolderEntry>> {
        Ok(self
            .read()
            .folders
            .iter()
            .take(FOLDER_PAGE_SIZE as usize)
            .cloned()
            .collect())
    }

    async fn list_images(
        &self,
        _session: &AuthorizedSession,
        query: &ImageQuery,
    ) -> Result<ImagePage> {
        let files = self
            .read()
            .images
            .iter()
            .filter(|image| is_image_mime_type(&image.mime_type))
            .filter(|image| match &query.folder {
                Some(folder) => image.parent.as_deref() == Some(folder.as_str()),
                None => true,
            })
            .map(|image| image.entry.clone())
            .collect();

        Ok(ImagePage {
            files,
            next_page_token: None,
        })
    }

    async fn download_image(
        &self,
        _session: &AuthorizedSession,
        file_id: &str,
    ) -> Result<ImageContent> {
        let image = self
            .read()
            .images
            .iter()
            .find(|image| image.entry.id == file_id && is_image_mime_type(&image.mime_type))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Image not found: {}", file_id)))?;

        Ok(ImageContent {
            mime_type: image.mime_type,
            stream: Box::pin(stream::once(async move { Ok(image.data) })),
        })
    }
}
