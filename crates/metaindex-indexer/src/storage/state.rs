//! Persisted build state: the fingerprint and record of every indexed path.
//!
//! The state is only consulted to decide reuse on the next incremental
//! build. Loading never fails hard: a missing file is an empty state, and a
//! damaged one yields a [`FallbackReason`] that turns the build into a full
//! rebuild.

use crate::record::FileRecord;
use crate::report::SCHEMA_VERSION;
use crate::scanner::Fingerprint;
use crate::IndexerError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

use super::write_atomic;

/// Fingerprint and record for one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub fingerprint: Fingerprint,
    pub record: FileRecord,
}

/// Path-keyed entry map. Iteration is always in path order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    entries: BTreeMap<String, StateEntry>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&StateEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn insert(&mut self, path: String, entry: StateEntry) -> Option<StateEntry> {
        self.entries.insert(path, entry)
    }

    pub fn remove(&mut self, path: &str) -> Option<StateEntry> {
        self.entries.remove(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StateEntry)> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Records in path order.
    pub fn records(&self) -> Vec<FileRecord> {
        self.entries.values().map(|e| e.record.clone()).collect()
    }

    /// Overlay `newer` on top of this state; entries in `newer` win.
    pub fn merge(&mut self, newer: State) {
        self.entries.extend(newer.entries);
    }

    /// Number of paths in this state that are absent from `other`.
    pub fn count_missing_from(&self, other: &State) -> usize {
        self.paths().filter(|p| !other.contains(p)).count()
    }
}

/// `state.json`: the versioned envelope around [`State`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub schema_version: u64,
    pub repo_root: String,
    pub updated_at_epoch: i64,
    pub entries: State,
}

/// Why a prior state was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Unreadable file or invalid JSON
    CorruptState,
    /// Top level is not a JSON object
    InvalidStateShape,
    /// `schema_version` is missing or not supported
    StateSchemaMismatch,
    /// `entries` is not a JSON object
    InvalidStateEntries,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::CorruptState => "corrupt_state",
            FallbackReason::InvalidStateShape => "invalid_state_shape",
            FallbackReason::StateSchemaMismatch => "state_schema_mismatch",
            FallbackReason::InvalidStateEntries => "invalid_state_entries",
        }
    }
}

/// Outcome of loading a prior state.
#[derive(Debug, Clone, PartialEq)]
pub enum StateLoad {
    /// No state has been written yet
    Missing,
    Loaded(State),
    /// The state exists but cannot be trusted
    Fallback(FallbackReason),
}

/// What to do with a document of a given schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaDecision {
    Accept,
    Reject(FallbackReason),
}

/// Decision table for stored schema versions. New versions that can be
/// migrated get their own arm here.
pub fn decide_schema(found: Option<u64>) -> SchemaDecision {
    match found {
        Some(SCHEMA_VERSION) => SchemaDecision::Accept,
        _ => SchemaDecision::Reject(FallbackReason::StateSchemaMismatch),
    }
}

/// Parse raw `state.json` bytes.
///
/// Individual entries that do not have a 4-element fingerprint and a valid
/// record keyed by its own path are dropped; the rest of the state is kept.
pub fn parse_state(data: &[u8]) -> StateLoad {
    let payload: Value = match serde_json::from_slice(data) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "State is not valid JSON");
            return StateLoad::Fallback(FallbackReason::CorruptState);
        }
    };

    let Value::Object(mut payload) = payload else {
        return StateLoad::Fallback(FallbackReason::InvalidStateShape);
    };

    let version = payload.get("schema_version").and_then(Value::as_u64);
    if let SchemaDecision::Reject(reason) = decide_schema(version) {
        return StateLoad::Fallback(reason);
    }

    let entries = match payload.remove("entries") {
        None => return StateLoad::Loaded(State::new()),
        Some(Value::Object(entries)) => entries,
        Some(_) => return StateLoad::Fallback(FallbackReason::InvalidStateEntries),
    };

    let mut state = State::new();
    let mut dropped = 0usize;
    for (path, value) in entries {
        match serde_json::from_value::<StateEntry>(value) {
            Ok(entry) if entry.record.path == path => {
                state.insert(path, entry);
            }
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!(dropped, kept = state.len(), "Dropped malformed state entries");
    }

    StateLoad::Loaded(state)
}

/// Durable home of the build state.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the prior state. Never fails; problems become [`StateLoad::Fallback`].
    async fn load(&self) -> StateLoad;

    /// Replace the stored state.
    async fn persist(&self, document: &StateDocument) -> Result<(), IndexerError>;
}

/// `state.json` on disk.
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn load(&self) -> StateLoad {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => {}
            _ => return StateLoad::Missing,
        }

        match tokio::fs::read(&self.path).await {
            Ok(data) => parse_state(&data),
            Err(e) => {
                debug!(path = ?self.path, error = %e, "Failed to read state");
                StateLoad::Fallback(FallbackReason::CorruptState)
            }
        }
    }

    async fn persist(&self, document: &StateDocument) -> Result<(), IndexerError> {
        let mut json = serde_json::to_vec_pretty(document)?;
        json.push(b'\n');
        write_atomic(&self.path, &json).await
    }
}

/// In-memory store holding the serialized document, so loads go through the
/// same parsing as the file store.
#[derive(Default)]
pub struct MemoryStateStore {
    data: Mutex<Option<Vec<u8>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from raw bytes, which need not be valid.
    pub fn with_raw(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Mutex::new(Some(data.into())),
        }
    }

    /// Raw bytes of the last persisted document.
    pub fn raw(&self) -> Option<Vec<u8>> {
        self.data.lock().clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> StateLoad {
        match self.data.lock().as_deref() {
            Some(data) => parse_state(data),
            None => StateLoad::Missing,
        }
    }

    async fn persist(&self, document: &StateDocument) -> Result<(), IndexerError> {
        let json = serde_json::to_vec(document)?;
        *self.data.lock() = Some(json);
        Ok(())
    }
}
