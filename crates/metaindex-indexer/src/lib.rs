//! Metaindex Indexer
//!
//! This crate builds a metadata-only index of a repository:
//! - Sorted, symlink-free traversal with directory-name exclusions
//! - Per-file fingerprints so unchanged files are reused across builds
//! - File-count, wall-clock and probe-byte budgets with partial-run safety
//! - Aggregate or per-top-level sharded JSONL record output
//! - Atomic writes of records, manifest, state and run report

pub mod build;
mod cancel;
mod error;
pub mod record;
pub mod report;
pub mod scanner;
pub mod storage;

pub use build::{changed_top_levels, BudgetTracker, Budgets, BuildOptions, BuildSummary, IndexBuilder};
pub use cancel::CancelFlag;
pub use error::IndexerError;
pub use record::{FileRecord, ROOT_TOP_LEVEL};
pub use report::{
    Manifest, ManifestHeader, RunConfig, RunCounters, RunReport, RunStatus, StopReason,
    StorageDescriptor, StorageSummary, Usage, SCHEMA_VERSION,
};
pub use scanner::{Fingerprint, Language};
pub use storage::{
    FallbackReason, IndexLayout, JsonStateStore, MemoryStateStore, State, StateDocument,
    StateEntry, StateLoad, StateStore,
};
