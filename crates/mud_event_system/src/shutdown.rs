//! Shutdown coordination shared by the listener, reactor, dispatch thread and
//! the application shell.
//!
//! Shutdown happens in two steps: `initiate` tells the I/O threads to stop
//! taking new work, `complete` records that queued events have been drained
//! and the process may exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Cloneable shutdown flags. All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct ShutdownState {
    initiated: Arc<AtomicBool>,
    complete: Arc<AtomicBool>,
}

impl ShutdownState {
    /// Creates a state with neither flag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once shutdown has begun; I/O loops exit at their next check.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.initiated.load(Ordering::Acquire)
    }

    /// True once every component reported that it has stopped.
    pub fn is_shutdown_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Starts shutdown. Calling it more than once is harmless.
    pub fn initiate_shutdown(&self) {
        if !self.initiated.swap(true, Ordering::AcqRel) {
            info!("🛑 Shutdown initiated - listener and reactor will stop");
        }
    }

    /// Marks shutdown as finished.
    pub fn complete_shutdown(&self) {
        if !self.complete.swap(true, Ordering::AcqRel) {
            info!("✅ Shutdown complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flags() {
        let state = ShutdownState::new();
        let observer = state.clone();
        assert!(!observer.is_shutdown_initiated());

        state.initiate_shutdown();
        state.initiate_shutdown();
        assert!(observer.is_shutdown_initiated());
        assert!(!observer.is_shutdown_complete());

        observer.complete_shutdown();
        assert!(state.is_shutdown_complete());
    }
}
