//! Error types for index queries.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while querying an index.
///
/// Every variant is a usage error: the query cannot be answered as asked.
/// Malformed record lines are not errors; they are skipped.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Index directory does not exist
    #[error("Index directory not found: {0}")]
    IndexDirNotFound(PathBuf),

    /// Index directory has no manifest
    #[error("Manifest not found: {0} (run `metaindex build` first)")]
    ManifestNotFound(PathBuf),

    /// Manifest exists but cannot be parsed
    #[error("Invalid manifest {path}: {message}")]
    InvalidManifest { path: PathBuf, message: String },

    /// Scope is not a top-level of the sharded index
    #[error("Unknown scope '{scope}' (available: {})", available.join(", "))]
    UnknownScope { scope: String, available: Vec<String> },

    /// Row limit below 1
    #[error("Invalid limit: {0} (must be >= 1)")]
    InvalidLimit(usize),

    /// Minimum size larger than maximum size
    #[error("Invalid size range: min {min} > max {max}")]
    InvalidSizeRange { min: u64, max: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueryError>;
