//! Indexer error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during indexing operations.
///
/// Per-item problems (an unreadable file or directory, a malformed state
/// entry) never surface here; they are counted and skipped. These variants
/// are the failures that abort a build.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Path not found
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// Invalid build options
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for IndexerError {
    fn from(e: serde_json::Error) -> Self {
        IndexerError::Serialization(e.to_string())
    }
}
