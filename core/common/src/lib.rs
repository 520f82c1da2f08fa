//! Common utilities and types shared across Drive Gallery modules.
//!
//! This module provides the error type and the remote entry types that the
//! storage, web and CLI crates exchange.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{FileEntry, FolderEntry, FolderId, ImagePage};
