//! Build orchestration.
//!
//! A build loads the prior state (incremental mode only), scans the tree
//! under its budgets, decides the final entry set and writes four artifacts:
//! the record file(s), `manifest.json`, `state.json` and `run.json`.
//!
//! A scan that completes replaces the prior state outright and counts
//! removals. A scan that stops early (budget or cancellation) overlays what
//! it produced on the prior state and removes nothing.

mod budget;
mod scan;

pub use budget::{BudgetTracker, Budgets};

use crate::cancel::CancelFlag;
use crate::record::FileRecord;
use crate::report::{
    round_millis, Manifest, RunConfig, RunCounters, RunReport, RunStatus, StorageSummary, Usage,
    SCHEMA_VERSION,
};
use crate::scanner::Walker;
use crate::storage::{
    write_json, FallbackReason, IndexLayout, JsonStateStore, RecordWriter, ShardPlan, State,
    StateDocument, StateLoad, StateStore, WriteOutcome,
};
use crate::IndexerError;
use chrono::Utc;
use metaindex_core::{resolve_against, BuildMode, IndexConfig};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Everything a build needs to know.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Repository root to index
    pub repo_root: PathBuf,
    /// Index directory; relative paths resolve against `repo_root`
    pub index_dir: PathBuf,
    pub mode: BuildMode,
    pub budgets: Budgets,
    /// Extra directory names to exclude
    pub exclude_dirs: Vec<String>,
    /// Write per-top-level shards instead of `files.jsonl`
    pub sharded: bool,
    /// Extra copy of the run report; relative paths resolve against `repo_root`
    pub json_out: Option<PathBuf>,
}

impl BuildOptions {
    /// Options for `repo_root` taken from a loaded configuration.
    pub fn from_config(repo_root: &Path, config: &IndexConfig) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
            index_dir: config.index_dir.clone(),
            mode: config.mode,
            budgets: Budgets {
                max_files_per_run: config.max_files_per_run,
                max_seconds: config.max_seconds,
                max_read_bytes: config.max_read_bytes,
            },
            exclude_dirs: config.exclude_dirs.clone(),
            sharded: config.sharded,
            json_out: None,
        }
    }

    /// Reject bad options before any I/O happens.
    pub fn validate(&self) -> Result<(), IndexerError> {
        self.budgets.validate()?;
        if !self.repo_root.is_dir() {
            return Err(IndexerError::NotFound(self.repo_root.clone()));
        }
        // A root the walker cannot list would look like an empty tree and
        // wipe the prior state.
        if let Err(e) = std::fs::read_dir(&self.repo_root) {
            return Err(IndexerError::InvalidInput(format!(
                "cannot read repository root {}: {}",
                self.repo_root.display(),
                e
            )));
        }
        Ok(())
    }
}

/// Result of a build: the documents that were written.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub manifest: Manifest,
    pub report: RunReport,
    pub index_dir: PathBuf,
    /// Record files written and removed this run
    pub writes: WriteOutcome,
}

/// Runs builds for one repository/index directory pair.
///
/// Only one build should run against an index directory at a time; callers
/// serialize builds themselves.
pub struct IndexBuilder<S: StateStore = JsonStateStore> {
    repo_root: PathBuf,
    layout: IndexLayout,
    options: BuildOptions,
    excludes: BTreeSet<String>,
    store: S,
}

impl IndexBuilder<JsonStateStore> {
    /// Create a builder persisting state to `<index_dir>/state.json`.
    pub fn new(options: BuildOptions) -> Result<Self, IndexerError> {
        let (repo_root, index_dir) = resolve_dirs(&options)?;
        let store = JsonStateStore::new(IndexLayout::new(index_dir.clone()).state_path());
        Ok(Self::assemble(options, repo_root, index_dir, store))
    }
}

impl<S: StateStore> IndexBuilder<S> {
    /// Create a builder with a custom state store.
    pub fn with_store(options: BuildOptions, store: S) -> Result<Self, IndexerError> {
        let (repo_root, index_dir) = resolve_dirs(&options)?;
        Ok(Self::assemble(options, repo_root, index_dir, store))
    }

    fn assemble(options: BuildOptions, repo_root: PathBuf, index_dir: PathBuf, store: S) -> Self {
        let config = IndexConfig {
            exclude_dirs: options.exclude_dirs.clone(),
            ..Default::default()
        };
        let excludes = config.effective_excludes(&index_dir);
        Self {
            repo_root,
            layout: IndexLayout::new(index_dir),
            options,
            excludes,
            store,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn index_dir(&self) -> &Path {
        self.layout.dir()
    }

    pub fn excludes(&self) -> &BTreeSet<String> {
        &self.excludes
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one build. Budget exhaustion and cancellation are not errors:
    /// they produce a `partial` report.
    pub async fn run(&self, cancel: &CancelFlag) -> Result<BuildSummary, IndexerError> {
        let started_at = Utc::now();
        let started = Instant::now();

        info!(
            root = ?self.repo_root,
            index = ?self.layout.dir(),
            mode = %self.options.mode,
            sharded = self.options.sharded,
            "Starting build"
        );

        let (prior, fallback) = self.load_prior().await;

        let tracker = BudgetTracker::start(self.options.budgets);
        let walker = Walker::new(&self.repo_root, self.excludes.clone());
        let outcome = scan::scan(&self.repo_root, &walker, &prior, &tracker, cancel).await;

        let mut counters = outcome.counters;
        let status = outcome.stop.status();
        let final_state = match status {
            RunStatus::Ok => {
                counters.files_removed = prior.count_missing_from(&outcome.produced) as u64;
                outcome.produced
            }
            RunStatus::Partial => {
                let mut merged = prior.clone();
                merged.merge(outcome.produced);
                counters.files_removed = 0;
                merged
            }
        };

        let records = final_state.records();
        let writes = self
            .write_records(&records, &prior, &final_state, fallback.is_some())
            .await?;

        let finished_at = Utc::now();
        let elapsed = round_millis(started.elapsed().as_secs_f64());
        let repo_root = posix_string(&self.repo_root);

        let manifest = Manifest {
            schema_version: SCHEMA_VERSION,
            repo_root: repo_root.clone(),
            generated_at_epoch: finished_at.timestamp(),
            run_config: self.run_config(),
            counters,
            storage: writes.storage.clone(),
        };

        let state = StateDocument {
            schema_version: SCHEMA_VERSION,
            repo_root,
            updated_at_epoch: finished_at.timestamp(),
            entries: final_state,
        };

        let report = RunReport {
            schema_version: SCHEMA_VERSION,
            status,
            stop_reason: outcome.stop,
            started_at_epoch: started_at.timestamp(),
            finished_at_epoch: finished_at.timestamp(),
            duration_seconds: elapsed,
            fallback_rebuild: fallback.is_some(),
            fallback_reason: fallback,
            budgets: self.options.budgets,
            usage: Usage {
                files_seen: counters.files_seen,
                bytes_read: counters.bytes_read,
                seconds_elapsed: elapsed,
            },
            counters,
            storage: StorageSummary {
                sharded: writes.storage.sharded,
                record_count: records.len() as u64,
                scope_count: if writes.storage.sharded {
                    writes.storage.shard_map.len() as u64
                } else {
                    1
                },
            },
        };

        write_json(&self.layout.manifest_path(), &manifest).await?;
        self.store.persist(&state).await?;
        write_json(&self.layout.run_path(), &report).await?;

        if let Some(out) = &self.options.json_out {
            write_json(&resolve_against(&self.repo_root, out), &report).await?;
        }

        log_finish(&report, &counters);

        Ok(BuildSummary {
            manifest,
            report,
            index_dir: self.layout.dir().to_path_buf(),
            writes,
        })
    }

    async fn load_prior(&self) -> (State, Option<FallbackReason>) {
        if self.options.mode == BuildMode::Full {
            return (State::new(), None);
        }
        match self.store.load().await {
            StateLoad::Missing => (State::new(), None),
            StateLoad::Loaded(state) => {
                info!(entries = state.len(), "Loaded prior state");
                (state, None)
            }
            StateLoad::Fallback(reason) => {
                warn!(reason = reason.as_str(), "Prior state unusable, rebuilding");
                (State::new(), Some(reason))
            }
        }
    }

    async fn write_records(
        &self,
        records: &[FileRecord],
        prior: &State,
        final_state: &State,
        fallback: bool,
    ) -> Result<WriteOutcome, IndexerError> {
        tokio::fs::create_dir_all(self.layout.dir()).await?;
        let writer = RecordWriter::new(&self.layout);

        if !self.options.sharded {
            return writer.write_single(records).await;
        }

        let previous_shard_map = self
            .layout
            .read_manifest_header()
            .await
            .filter(|h| h.storage.sharded)
            .map(|h| h.storage.shard_map)
            .unwrap_or_default();

        let plan = ShardPlan {
            rewrite_all: self.options.mode == BuildMode::Full || fallback,
            changed_top_levels: changed_top_levels(prior, final_state),
            previous_shard_map,
        };
        writer.write_sharded(records, &plan).await
    }

    fn run_config(&self) -> RunConfig {
        RunConfig {
            mode: self.options.mode,
            max_files_per_run: self.options.budgets.max_files_per_run,
            max_seconds: self.options.budgets.max_seconds,
            max_read_bytes: self.options.budgets.max_read_bytes,
            exclude_dir: self.excludes.iter().cloned().collect(),
            sharded: self.options.sharded,
        }
    }
}

fn log_finish(report: &RunReport, counters: &RunCounters) {
    if report.status == RunStatus::Partial {
        warn!(
            stop_reason = report.stop_reason.as_str(),
            files_seen = counters.files_seen,
            "Build stopped early"
        );
    }
    info!(
        status = report.status.as_str(),
        indexed = counters.files_indexed,
        updated = counters.files_updated,
        reused = counters.files_reused,
        removed = counters.files_removed,
        unreadable = counters.files_unreadable,
        records = report.storage.record_count,
        duration_s = report.duration_seconds,
        "Build complete"
    );
}

/// Top-levels whose records differ between `prior` and `current`, including
/// those of removed paths.
pub fn changed_top_levels(prior: &State, current: &State) -> BTreeSet<String> {
    let mut changed = BTreeSet::new();
    for (path, entry) in current.iter() {
        if prior.get(path).map(|old| &old.record) != Some(&entry.record) {
            changed.insert(entry.record.top_level.clone());
        }
    }
    for (path, entry) in prior.iter() {
        if !current.contains(path) {
            changed.insert(entry.record.top_level.clone());
        }
    }
    changed
}

fn resolve_dirs(options: &BuildOptions) -> Result<(PathBuf, PathBuf), IndexerError> {
    options.validate()?;
    let repo_root = options
        .repo_root
        .canonicalize()
        .map_err(|_| IndexerError::NotFound(options.repo_root.clone()))?;
    let index_dir = normalize(&resolve_against(&repo_root, &options.index_dir));
    Ok((repo_root, index_dir))
}

/// Lexically normalize `path` (drop `.`, fold `..`) without touching the
/// file system, since the index directory may not exist yet.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn posix_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Fingerprint;
    use crate::storage::{MemoryStateStore, StateEntry};
    use tempfile::tempdir;

    fn options(root: &Path) -> BuildOptions {
        BuildOptions {
            repo_root: root.to_path_buf(),
            index_dir: PathBuf::from(".codex-index"),
            mode: BuildMode::Incremental,
            budgets: Budgets {
                max_files_per_run: 1000,
                max_seconds: 60,
                max_read_bytes: 1 << 20,
            },
            exclude_dirs: Vec::new(),
            sharded: false,
            json_out: None,
        }
    }

    fn entry(path: &str, size: u64) -> StateEntry {
        let fingerprint = Fingerprint(size, 1, 0, 0);
        StateEntry {
            fingerprint,
            record: FileRecord::new(path, &fingerprint, true),
        }
    }

    #[test]
    fn test_validate_rejects_missing_root() {
        let temp_dir = tempdir().unwrap();
        let opts = options(&temp_dir.path().join("nope"));
        assert!(matches!(opts.validate(), Err(IndexerError::NotFound(_))));
    }

    #[test]
    fn test_validate_rejects_zero_budgets() {
        let temp_dir = tempdir().unwrap();
        let mut opts = options(temp_dir.path());
        opts.budgets.max_files_per_run = 0;
        assert!(matches!(opts.validate(), Err(IndexerError::InvalidInput(_))));

        let mut opts = options(temp_dir.path());
        opts.budgets.max_read_bytes = 0;
        assert!(matches!(opts.validate(), Err(IndexerError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_rejects_file_root() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(options(&file).validate(), Err(IndexerError::NotFound(_))));
    }

    #[test]
    #[cfg(unix)]
    fn test_unreadable_root_is_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().join("repo");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("a.txt"), "a").unwrap();

        std::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o000)).unwrap();
        let readable = std::fs::read_dir(&root).is_ok();
        let result = IndexBuilder::new(options(&root));
        std::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o755)).unwrap();

        // Privileged users can list the directory regardless of its mode.
        if readable {
            return;
        }
        assert!(matches!(result, Err(IndexerError::InvalidInput(_))));
    }

    #[test]
    fn test_index_dir_name_is_excluded() {
        let temp_dir = tempdir().unwrap();
        let mut opts = options(temp_dir.path());
        opts.index_dir = PathBuf::from("./meta/../my-index");
        let builder = IndexBuilder::new(opts).unwrap();

        assert!(builder.excludes().contains("my-index"));
        assert!(builder.excludes().contains(".git"));
        assert!(builder.index_dir().ends_with("my-index"));
        assert!(!builder.index_dir().to_string_lossy().contains(".."));
    }

    #[test]
    fn test_changed_top_levels() {
        let mut prior = State::new();
        prior.insert("src/a.rs".into(), entry("src/a.rs", 1));
        prior.insert("docs/x.md".into(), entry("docs/x.md", 1));
        prior.insert("old/y.txt".into(), entry("old/y.txt", 1));

        let mut current = State::new();
        current.insert("src/a.rs".into(), entry("src/a.rs", 2));
        current.insert("docs/x.md".into(), entry("docs/x.md", 1));
        current.insert("README.md".into(), entry("README.md", 1));

        let changed = changed_top_levels(&prior, &current);
        let expected: BTreeSet<String> = ["src", "old", "__root__"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(changed, expected);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
    }

    #[tokio::test]
    async fn test_memory_store_fallback_is_reported() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), "a").unwrap();

        let store = MemoryStateStore::with_raw(r#"{"schema_version": 0}"#);
        let builder = IndexBuilder::with_store(options(temp_dir.path()), store).unwrap();
        let summary = builder.run(&CancelFlag::new()).await.unwrap();

        assert!(summary.report.fallback_rebuild);
        assert_eq!(
            summary.report.fallback_reason,
            Some(FallbackReason::StateSchemaMismatch)
        );
        assert_eq!(summary.report.counters.files_indexed, 1);

        // The store now holds a valid state.
        let reloaded = builder.store().load().await;
        assert!(matches!(reloaded, StateLoad::Loaded(s) if s.len() == 1));
    }

    #[tokio::test]
    async fn test_full_mode_ignores_prior_state() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), "a").unwrap();

        let mut opts = options(temp_dir.path());
        opts.mode = BuildMode::Full;
        let store = MemoryStateStore::with_raw("garbage");
        let builder = IndexBuilder::with_store(opts, store).unwrap();
        let summary = builder.run(&CancelFlag::new()).await.unwrap();

        assert!(!summary.report.fallback_rebuild);
        assert_eq!(summary.report.counters.files_indexed, 1);
        assert_eq!(summary.report.counters.files_reused, 0);
    }
}
