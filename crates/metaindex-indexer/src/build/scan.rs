//! The scanning loop: walk, fingerprint, reuse or classify, under budget.

use super::budget::BudgetTracker;
use crate::cancel::CancelFlag;
use crate::record::FileRecord;
use crate::report::{RunCounters, StopReason};
use crate::scanner::{
    classify_extension, normalized_extension, probe_text, relative_key, ExtensionClass,
    Fingerprint, ProbeOutcome, Walker,
};
use crate::storage::{State, StateEntry};
use std::path::Path;
use tracing::debug;

/// Entries produced by one scan and why it ended.
#[derive(Debug)]
pub(crate) struct ScanOutcome {
    /// Entries reused or recomputed this run; never includes prior entries
    /// for paths the scan did not reach
    pub produced: State,
    pub counters: RunCounters,
    pub stop: StopReason,
}

/// Scan `root`, reusing entries from `prior` whose fingerprint is unchanged.
///
/// `prior` is empty for full builds, so nothing is reused there.
pub(crate) async fn scan(
    root: &Path,
    walker: &Walker,
    prior: &State,
    tracker: &BudgetTracker,
    cancel: &CancelFlag,
) -> ScanOutcome {
    let mut counters = RunCounters::default();
    let mut produced = State::new();
    let mut stop = StopReason::Completed;

    let mut walk = walker.walk();
    for path in walk.by_ref() {
        if let Some(reason) = tracker.check_candidate(counters.files_seen, cancel) {
            stop = reason;
            break;
        }
        counters.files_seen += 1;

        let Some(rel_path) = relative_key(root, &path) else {
            continue;
        };

        let fingerprint = match Fingerprint::of_path(&path) {
            Ok((fp, meta)) if meta.is_file() => fp,
            Ok(_) => {
                debug!(path = %rel_path, "No longer a regular file");
                counters.files_unreadable += 1;
                continue;
            }
            Err(e) => {
                debug!(path = %rel_path, error = %e, "Failed to stat file");
                counters.files_unreadable += 1;
                continue;
            }
        };

        if let Some(old) = prior.get(&rel_path) {
            if old.fingerprint == fingerprint {
                counters.files_reused += 1;
                produced.insert(rel_path, old.clone());
                continue;
            }
        }

        let ext = normalized_extension(Path::new(&rel_path));
        let text_like = match classify_extension(&ext) {
            ExtensionClass::Text => true,
            ExtensionClass::Binary => false,
            ExtensionClass::Unknown => {
                let Some(allowance) = tracker.probe_allowance(counters.bytes_read) else {
                    stop = StopReason::MaxReadBytesReached;
                    break;
                };
                match probe_text(&path, allowance).await {
                    ProbeOutcome::Read { text_like, bytes } => {
                        counters.bytes_read += bytes;
                        text_like
                    }
                    ProbeOutcome::Unreadable => {
                        counters.files_unreadable += 1;
                        false
                    }
                }
            }
        };

        let record = FileRecord::new(&rel_path, &fingerprint, text_like);
        if prior.contains(&rel_path) {
            counters.files_updated += 1;
        } else {
            counters.files_indexed += 1;
        }
        produced.insert(
            rel_path,
            StateEntry {
                fingerprint,
                record,
            },
        );
    }

    let walk_counts = walk.counts();
    counters.dirs_skipped = walk_counts.dirs_skipped;
    counters.symlinks_skipped = walk_counts.symlinks_skipped;
    counters.files_unreadable += walk_counts.entries_unreadable;

    ScanOutcome {
        produced,
        counters,
        stop,
    }
}
