//! Storage abstraction for document persistence.
//!
//! This module defines the [`DocumentStorage`] trait which abstracts over the
//! local embedded storage backends (SQLite, in-memory). The document is
//! persisted as one opaque binary blob under a fixed key and always replaced
//! wholesale.

use crate::error::KurumiError;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, KurumiError>;

/// Fixed storage key of the Kurumi document.
pub const DOCUMENT_KEY: &str = "kurumi-doc";

/// Trait for document storage backends.
pub trait DocumentStorage: Send + Sync {
    /// Load the full document state as a binary blob.
    ///
    /// Returns `None` if the document doesn't exist.
    fn load_doc(&self, name: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Save the full document state, overwriting any existing state.
    fn save_doc(&self, name: &str, state: &[u8]) -> StorageResult<()>;

    /// Delete a document.
    fn delete_doc(&self, name: &str) -> StorageResult<()>;
}
