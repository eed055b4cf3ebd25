//! Per-run budgets: file count, wall-clock seconds and probe bytes.

use crate::cancel::CancelFlag;
use crate::report::StopReason;
use crate::scanner::PROBE_BYTES;
use crate::IndexerError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Limits applied to one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budgets {
    /// Candidates examined before stopping; must be at least 1
    pub max_files_per_run: u64,
    /// Wall-clock seconds before stopping; must be at least 1
    pub max_seconds: u64,
    /// Total bytes content probes may read; must be at least 1
    pub max_read_bytes: u64,
}

impl Budgets {
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.max_files_per_run < 1 {
            return Err(IndexerError::InvalidInput(
                "max_files_per_run must be >= 1".to_string(),
            ));
        }
        if self.max_seconds < 1 {
            return Err(IndexerError::InvalidInput(
                "max_seconds must be >= 1".to_string(),
            ));
        }
        if self.max_read_bytes < 1 {
            return Err(IndexerError::InvalidInput(
                "max_read_bytes must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Checks budgets against a monotonic clock before each unit of work.
#[derive(Debug, Clone)]
pub struct BudgetTracker {
    budgets: Budgets,
    /// `None` when the deadline lies beyond what `Instant` can represent
    deadline: Option<Instant>,
}

impl BudgetTracker {
    pub fn start(budgets: Budgets) -> Self {
        let deadline = Instant::now().checked_add(Duration::from_secs(budgets.max_seconds));
        Self { budgets, deadline }
    }

    pub fn with_deadline(budgets: Budgets, deadline: Instant) -> Self {
        Self {
            budgets,
            deadline: Some(deadline),
        }
    }

    /// Whether the next candidate may be processed, given how many have been
    /// seen so far. Cancellation is reported first, then the file budget,
    /// then the deadline.
    pub fn check_candidate(&self, files_seen: u64, cancel: &CancelFlag) -> Option<StopReason> {
        self.check_candidate_at(files_seen, cancel, Instant::now())
    }

    pub fn check_candidate_at(
        &self,
        files_seen: u64,
        cancel: &CancelFlag,
        now: Instant,
    ) -> Option<StopReason> {
        if cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        if files_seen >= self.budgets.max_files_per_run {
            return Some(StopReason::MaxFilesPerRunReached);
        }
        if self.deadline.is_some_and(|deadline| now >= deadline) {
            return Some(StopReason::MaxSecondsReached);
        }
        None
    }

    /// Bytes the next probe may read, or `None` once the byte budget is spent.
    pub fn probe_allowance(&self, bytes_read: u64) -> Option<u64> {
        let remaining = self.budgets.max_read_bytes.saturating_sub(bytes_read);
        if remaining == 0 {
            None
        } else {
            Some(remaining.min(PROBE_BYTES))
        }
    }
}
