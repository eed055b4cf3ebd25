//! Persistence layer for index artifacts.
//!
//! Every artifact is written to a temp file in the same directory and then
//! renamed into place, so readers see either the old or the new file.

mod shards;
mod state;

pub use shards::{sanitize_shard_name, RecordWriter, ShardPlan, WriteOutcome};
pub use state::{
    decide_schema, FallbackReason, JsonStateStore, MemoryStateStore, SchemaDecision, State,
    StateDocument, StateEntry, StateLoad, StateStore,
};

use crate::report::ManifestHeader;
use crate::IndexerError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const STATE_FILE: &str = "state.json";
pub const RUN_FILE: &str = "run.json";
pub const FILES_FILE: &str = "files.jsonl";
pub const SHARDS_DIR: &str = "shards";

/// File layout of an index directory.
#[derive(Debug, Clone)]
pub struct IndexLayout {
    dir: PathBuf,
}

impl IndexLayout {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    pub fn run_path(&self) -> PathBuf {
        self.dir.join(RUN_FILE)
    }

    pub fn files_path(&self) -> PathBuf {
        self.dir.join(FILES_FILE)
    }

    pub fn shards_dir(&self) -> PathBuf {
        self.dir.join(SHARDS_DIR)
    }

    /// Resolve a path stored in the manifest (relative to the index directory).
    pub fn resolve(&self, rel: &str) -> PathBuf {
        self.dir.join(rel)
    }

    /// Storage header of the manifest currently on disk, if it can be read.
    pub async fn read_manifest_header(&self) -> Option<ManifestHeader> {
        let path = self.manifest_path();
        let data = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice(&data) {
            Ok(header) => Some(header),
            Err(e) => {
                debug!(path = ?path, error = %e, "Ignoring unreadable manifest");
                None
            }
        }
    }
}

/// Write `value` as pretty-printed JSON with a trailing newline.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), IndexerError> {
    let mut json = serde_json::to_vec_pretty(value)?;
    json.push(b'\n');
    write_atomic(path, &json).await
}

/// Write one compact JSON document per line.
pub async fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), IndexerError> {
    let mut data = Vec::new();
    for row in rows {
        serde_json::to_writer(&mut data, row)?;
        data.push(b'\n');
    }
    write_atomic(path, &data).await
}

/// Atomic write: write to temp file, then rename
pub async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), IndexerError> {
    let dir = path
        .parent()
        .ok_or_else(|| IndexerError::Storage(format!("no parent directory for {}", path.display())))?;
    tokio::fs::create_dir_all(dir).await?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| IndexerError::Storage(format!("invalid file name: {}", path.display())))?;
    let temp_path = dir.join(format!(".{}.tmp", file_name));

    tokio::fs::write(&temp_path, data).await?;
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    debug!(path = ?path, size = data.len(), "Wrote artifact");

    Ok(())
}

/// Remove a file if present. Returns whether something was removed.
pub async fn remove_if_exists(path: &Path) -> Result<bool, IndexerError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
