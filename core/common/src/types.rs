//! Common types used throughout Drive Gallery.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a remote folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(String);

impl FolderId {
    /// Create a new FolderId from a string.
    ///
    /// # Preconditions
    /// - `id` must be non-empty after trimming
    ///
    /// # Errors
    /// - Returns error if id is empty
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(crate::Error::InvalidInput(
                "FolderId cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A remote folder, as returned by the folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    pub id: String,
    pub name: String,
}

/// A remote image file. Only items with an `image/*` MIME type are listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
}

/// One page of an image listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePage {
    /// Images on this page, in remote order.
    pub files: Vec<FileEntry>,
    /// Continuation token for the next page, if the remote has more.
    pub next_page_token: Option<String>,
}

impl ImagePage {
    /// Whether this page holds no images.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
