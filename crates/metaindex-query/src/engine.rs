//! Query execution over the artifacts of a build.
//!
//! The manifest decides where records live. Sources are streamed line by
//! line; a malformed line or an unreadable source is skipped, never fatal.

use crate::error::{QueryError, Result};
use crate::filter::{QueryOptions, RecordFilter, SCOPE_ALL};
use metaindex_indexer::storage::FILES_FILE;
use metaindex_indexer::{FileRecord, IndexLayout, ManifestHeader};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Rows returned by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Effective scope (`all` or a top-level name)
    pub scope: String,
    pub limit: usize,
    /// Matching rows before truncation
    pub total_matches: usize,
    /// Path-sorted rows, at most `limit`
    pub rows: Vec<FileRecord>,
}

/// Line statistics for one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub parsed: usize,
    pub skipped: usize,
}

/// An opened index directory.
pub struct QueryEngine {
    layout: IndexLayout,
    header: ManifestHeader,
}

impl QueryEngine {
    /// Open `index_dir` and read its manifest.
    pub fn open(index_dir: &Path) -> Result<Self> {
        if !index_dir.is_dir() {
            return Err(QueryError::IndexDirNotFound(index_dir.to_path_buf()));
        }
        let layout = IndexLayout::new(index_dir.to_path_buf());
        let manifest_path = layout.manifest_path();

        let data = match std::fs::read(&manifest_path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(QueryError::ManifestNotFound(manifest_path));
            }
            Err(e) => return Err(e.into()),
        };
        let header: ManifestHeader =
            serde_json::from_slice(&data).map_err(|e| QueryError::InvalidManifest {
                path: manifest_path.clone(),
                message: e.to_string(),
            })?;

        debug!(
            index = ?index_dir,
            sharded = header.storage.sharded,
            shards = header.storage.shard_map.len(),
            "Opened index"
        );

        Ok(Self { layout, header })
    }

    pub fn is_sharded(&self) -> bool {
        self.header.storage.sharded
    }

    /// Top-level names with their own shard, sorted.
    pub fn scopes(&self) -> Vec<String> {
        self.header.storage.shard_map.keys().cloned().collect()
    }

    /// Record files to read for `scope`.
    pub fn sources(&self, scope: &str) -> Result<Vec<PathBuf>> {
        let storage = &self.header.storage;
        if !storage.sharded {
            let rel = storage.files_path.as_deref().unwrap_or(FILES_FILE);
            return Ok(vec![self.layout.resolve(rel)]);
        }

        if scope == SCOPE_ALL {
            return Ok(storage
                .shard_map
                .values()
                .map(|rel| self.layout.resolve(rel))
                .collect());
        }

        match storage.shard_map.get(scope) {
            Some(rel) => Ok(vec![self.layout.resolve(rel)]),
            None => Err(QueryError::UnknownScope {
                scope: scope.to_string(),
                available: self.scopes(),
            }),
        }
    }

    /// Run a query.
    pub fn query(&self, options: &QueryOptions) -> Result<QueryResult> {
        options.validate()?;
        let scope = options.effective_scope();
        let sources = self.sources(scope)?;

        // A sharded scope is already applied by source selection.
        let filter = RecordFilter::new(options, !self.is_sharded());

        let mut rows = Vec::new();
        for source in &sources {
            let stats = read_records(source, |record| {
                if filter.matches(&record) {
                    rows.push(record);
                }
            })?;
            if stats.skipped > 0 {
                debug!(source = ?source, skipped = stats.skipped, "Skipped malformed lines");
            }
        }

        rows.sort_by(|a, b| a.path.cmp(&b.path));
        let total_matches = rows.len();
        rows.truncate(options.limit);

        Ok(QueryResult {
            scope: scope.to_string(),
            limit: options.limit,
            total_matches,
            rows,
        })
    }
}

/// Stream the records of one JSONL file into `visit`. A missing file reads
/// as empty; invalid UTF-8 is decoded lossily. A source that cannot be
/// opened or read is logged and yields whatever was read before the error.
pub fn read_records(path: &Path, mut visit: impl FnMut(FileRecord)) -> Result<SourceStats> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = ?path, "Record source missing, treating as empty");
            return Ok(SourceStats::default());
        }
        Err(e) => {
            warn!(path = ?path, "Failed to open record source: {}", e);
            return Ok(SourceStats::default());
        }
    };

    let mut reader = BufReader::new(file);
    let mut stats = SourceStats::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(path = ?path, "Failed to read record source: {}", e);
                break;
            }
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<FileRecord>(line) {
            Ok(record) => {
                stats.parsed += 1;
                visit(record);
            }
            Err(_) => stats.skipped += 1,
        }
    }
    Ok(stats)
}
