//! Run Cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The single cancellation signal shared by every worker of one run.
///
/// Cancellation is cooperative: the runner's reap loop checks the token and
/// kills its in-flight child, and strategies stop starting new iterations.
/// Already-completed samples are never discarded; iterations cut short are
/// recorded as failed samples so the result set stays complete.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from any thread, including a
    /// signal handler (a single atomic store).
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
