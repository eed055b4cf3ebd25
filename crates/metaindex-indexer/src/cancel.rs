//! Cooperative cancellation for builds.
//!
//! A build checks its flag before each candidate file. A cancelled build
//! stops like one that ran out of budget: the work done so far is flushed
//! as a `partial` result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop request. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the build stop at the next check.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_not_cancelled() {
        assert!(!CancelFlag::default().is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let flag = CancelFlag::new();
        let observer = flag.clone();
        flag.cancel();
        assert!(observer.is_cancelled());
    }
}
