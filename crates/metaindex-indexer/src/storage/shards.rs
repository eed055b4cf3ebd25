//! Record file output: one aggregate `files.jsonl`, or one segment per
//! top-level directory under `shards/`.
//!
//! Whichever layout is written, the other layout's files are removed so the
//! manifest and the disk always agree.

use super::{remove_if_exists, write_jsonl, IndexLayout, FILES_FILE, SHARDS_DIR};
use crate::record::FileRecord;
use crate::report::StorageDescriptor;
use crate::IndexerError;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Which segments must be rewritten on this run.
#[derive(Debug, Clone, Default)]
pub struct ShardPlan {
    /// Full build or fallback rebuild: rewrite every segment
    pub rewrite_all: bool,
    /// Top-levels with at least one new, updated or removed path
    pub changed_top_levels: BTreeSet<String>,
    /// Shard map of the previous manifest, if any
    pub previous_shard_map: BTreeMap<String, String>,
}

impl ShardPlan {
    fn must_rewrite(&self, top_level: &str, shard_rel: &str, exists: bool) -> bool {
        self.rewrite_all
            || !exists
            || self.changed_top_levels.contains(top_level)
            || self.previous_shard_map.get(top_level).map(String::as_str) != Some(shard_rel)
    }
}

/// What the writer did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub storage: StorageDescriptor,
    /// Files (relative to the index directory) written this run
    pub written: Vec<String>,
    /// Files (relative to the index directory) deleted this run
    pub removed: Vec<String>,
}

/// Writes record files into an index directory.
pub struct RecordWriter<'a> {
    layout: &'a IndexLayout,
}

impl<'a> RecordWriter<'a> {
    pub fn new(layout: &'a IndexLayout) -> Self {
        Self { layout }
    }

    /// Write all records to `files.jsonl` and drop any shard segments.
    /// `records` must already be sorted by path.
    pub async fn write_single(&self, records: &[FileRecord]) -> Result<WriteOutcome, IndexerError> {
        write_jsonl(&self.layout.files_path(), records).await?;

        let removed = self.remove_stale_shards(&BTreeSet::new()).await?;
        remove_dir_if_empty(&self.layout.shards_dir()).await;

        Ok(WriteOutcome {
            storage: StorageDescriptor {
                sharded: false,
                files_path: Some(FILES_FILE.to_string()),
                shard_map: BTreeMap::new(),
            },
            written: vec![FILES_FILE.to_string()],
            removed,
        })
    }

    /// Group records by `top_level` and write the segments `plan` selects.
    /// `records` must already be sorted by path.
    pub async fn write_sharded(
        &self,
        records: &[FileRecord],
        plan: &ShardPlan,
    ) -> Result<WriteOutcome, IndexerError> {
        let mut groups: BTreeMap<&str, Vec<&FileRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.top_level.as_str()).or_default().push(record);
        }

        let shard_map = assign_shard_files(groups.keys().copied());

        tokio::fs::create_dir_all(self.layout.shards_dir()).await?;

        let mut written = Vec::new();
        for (top_level, rows) in &groups {
            let shard_rel = &shard_map[*top_level];
            let path = self.layout.resolve(shard_rel);
            let exists = tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);

            if plan.must_rewrite(top_level, shard_rel, exists) {
                write_jsonl(&path, rows).await?;
                debug!(shard = %shard_rel, rows = rows.len(), "Wrote shard");
                written.push(shard_rel.clone());
            }
        }

        let active: BTreeSet<String> = shard_map
            .values()
            .filter_map(|rel| rel.strip_prefix(&format!("{}/", SHARDS_DIR)).map(str::to_string))
            .collect();
        let mut removed = self.remove_stale_shards(&active).await?;

        if remove_if_exists(&self.layout.files_path()).await? {
            removed.push(FILES_FILE.to_string());
        }

        info!(
            shards = shard_map.len(),
            written = written.len(),
            removed = removed.len(),
            "Sharded records written"
        );

        Ok(WriteOutcome {
            storage: StorageDescriptor {
                sharded: true,
                files_path: None,
                shard_map,
            },
            written,
            removed,
        })
    }

    /// Delete `*.jsonl` segments whose file name is not in `active`.
    async fn remove_stale_shards(
        &self,
        active: &BTreeSet<String>,
    ) -> Result<Vec<String>, IndexerError> {
        let dir = self.layout.shards_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut stale = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".jsonl") || active.contains(&name) {
                continue;
            }
            if entry.file_type().await?.is_file() {
                stale.push(name);
            }
        }
        stale.sort();

        let mut removed = Vec::with_capacity(stale.len());
        for name in stale {
            match tokio::fs::remove_file(dir.join(&name)).await {
                Ok(()) => {
                    debug!(shard = %name, "Removed stale shard");
                    removed.push(format!("{}/{}", SHARDS_DIR, name));
                }
                Err(e) => debug!(shard = %name, error = %e, "Failed to remove stale shard"),
            }
        }
        Ok(removed)
    }
}

async fn remove_dir_if_empty(dir: &std::path::Path) {
    // remove_dir refuses non-empty directories, which is what we want.
    let _ = tokio::fs::remove_dir(dir).await;
}

/// Map each top-level name (in sorted order) to `shards/<file>`. Names that
/// sanitize to the same file get a numeric suffix so no two groups share a
/// segment.
fn assign_shard_files<'t>(top_levels: impl Iterator<Item = &'t str>) -> BTreeMap<String, String> {
    let mut taken = BTreeSet::new();
    let mut map = BTreeMap::new();
    for top_level in top_levels {
        let base = sanitize_shard_name(top_level);
        let mut file = format!("{}.jsonl", base);
        let mut n = 2;
        while !taken.insert(file.clone()) {
            file = format!("{}_{}.jsonl", base, n);
            n += 1;
        }
        map.insert(top_level.to_string(), format!("{}/{}", SHARDS_DIR, file));
    }
    map
}

/// File stem for a top-level name: characters other than alphanumerics,
/// `-`, `_` and `.` become `_`, leading and trailing `.`/`_` are trimmed,
/// and an empty result becomes `root`.
pub fn sanitize_shard_name(top_level: &str) -> String {
    let replaced: String = top_level
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = replaced.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "root".to_string()
    } else {
        trimmed.to_string()
    }
}
