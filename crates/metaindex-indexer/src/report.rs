//! Manifest and run report documents.

use crate::build::Budgets;
use crate::storage::FallbackReason;
use metaindex_core::BuildMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version stamped on every JSON document the builder writes.
pub const SCHEMA_VERSION: u64 = 1;

/// Audit counters for one build. Persisted verbatim in the manifest and in
/// the run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub files_seen: u64,
    /// Recomputed records for paths absent from the prior state
    pub files_indexed: u64,
    /// Prior records carried over because the fingerprint matched
    pub files_reused: u64,
    /// Recomputed records for paths present in the prior state
    pub files_updated: u64,
    /// Prior paths gone after a complete traversal; always 0 when partial
    pub files_removed: u64,
    pub files_unreadable: u64,
    pub dirs_skipped: u64,
    pub symlinks_skipped: u64,
    /// Bytes consumed by content probes
    pub bytes_read: u64,
}

/// Final status of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    Partial,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Ok => "ok",
            RunStatus::Partial => "partial",
        }
    }
}

/// Why scanning ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    MaxFilesPerRunReached,
    MaxSecondsReached,
    MaxReadBytesReached,
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Completed => "completed",
            StopReason::MaxFilesPerRunReached => "max_files_per_run_reached",
            StopReason::MaxSecondsReached => "max_seconds_reached",
            StopReason::MaxReadBytesReached => "max_read_bytes_reached",
            StopReason::Cancelled => "cancelled",
        }
    }

    pub fn status(&self) -> RunStatus {
        match self {
            StopReason::Completed => RunStatus::Ok,
            _ => RunStatus::Partial,
        }
    }
}

/// Configuration a build ran with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub mode: BuildMode,
    pub max_files_per_run: u64,
    pub max_seconds: u64,
    pub max_read_bytes: u64,
    /// Sorted excluded directory names
    pub exclude_dir: Vec<String>,
    pub sharded: bool,
}

/// Where the records live. Readers must consult this before opening any
/// record file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDescriptor {
    #[serde(default)]
    pub sharded: bool,
    /// Aggregate file relative to the index directory; `None` when sharded
    #[serde(default)]
    pub files_path: Option<String>,
    /// Top-level name to shard file relative to the index directory
    #[serde(default)]
    pub shard_map: BTreeMap<String, String>,
}

/// `manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u64,
    pub repo_root: String,
    pub generated_at_epoch: i64,
    pub run_config: RunConfig,
    pub counters: RunCounters,
    pub storage: StorageDescriptor,
}

/// The parts of a manifest a reader needs. Unknown or missing fields are
/// tolerated so older and newer manifests stay readable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestHeader {
    #[serde(default)]
    pub schema_version: Option<u64>,
    #[serde(default)]
    pub storage: StorageDescriptor,
}

/// Resource consumption of one build.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub files_seen: u64,
    pub bytes_read: u64,
    pub seconds_elapsed: f64,
}

/// Output layout summary for the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSummary {
    pub sharded: bool,
    pub record_count: u64,
    /// Number of shards when sharded, otherwise 1
    pub scope_count: u64,
}

/// `run.json`: one build, overwritten by the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: u64,
    pub status: RunStatus,
    pub stop_reason: StopReason,
    pub started_at_epoch: i64,
    pub finished_at_epoch: i64,
    pub duration_seconds: f64,
    pub fallback_rebuild: bool,
    pub fallback_reason: Option<FallbackReason>,
    pub budgets: Budgets,
    pub usage: Usage,
    pub counters: RunCounters,
    pub storage: StorageSummary,
}

impl RunReport {
    /// One-line summary printed after a build.
    pub fn summary_line(&self) -> String {
        format!(
            "status={} stop_reason={} files_seen={} records={} bytes_read={} sharded={}",
            self.status.as_str(),
            self.stop_reason.as_str(),
            self.counters.files_seen,
            self.storage.record_count,
            self.counters.bytes_read,
            self.storage.sharded,
        )
    }
}

/// Round to millisecond precision for reporting.
pub(crate) fn round_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}
