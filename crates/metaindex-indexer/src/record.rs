//! The per-file catalog row.

use crate::scanner::{detect_language, normalized_extension, Fingerprint};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `top_level` value for files that sit directly in the repository root.
pub const ROOT_TOP_LEVEL: &str = "__root__";

/// One indexed file.
///
/// Fields are declared in alphabetical order; that is also the key order of
/// every serialized record line, which keeps record files diffable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Lower-cased extension with leading dot, or empty
    pub ext: String,
    /// Language identifier, `unknown` when the extension is not recognised
    pub lang: String,
    /// Modification time, nanoseconds since the Unix epoch
    pub mtime_ns: i64,
    /// Repository-relative path with forward slashes
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Text/binary classification
    pub text_like: bool,
    /// First path segment, or [`ROOT_TOP_LEVEL`]
    pub top_level: String,
}

impl FileRecord {
    /// Build a record for `rel_path` from its fingerprint and classification.
    pub fn new(rel_path: &str, fingerprint: &Fingerprint, text_like: bool) -> Self {
        let as_path = Path::new(rel_path);
        Self {
            ext: normalized_extension(as_path),
            lang: detect_language(as_path).as_str().to_string(),
            mtime_ns: fingerprint.mtime_ns(),
            path: rel_path.to_string(),
            size: fingerprint.size(),
            text_like,
            top_level: top_level_for(rel_path).to_string(),
        }
    }
}

/// First segment of a repository-relative key, or [`ROOT_TOP_LEVEL`].
pub fn top_level_for(rel_path: &str) -> &str {
    match rel_path.split_once('/') {
        Some((first, _)) => first,
        None => ROOT_TOP_LEVEL,
    }
}
