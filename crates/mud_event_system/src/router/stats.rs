/// Statistics tracking for the event router
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of router activity, used by the health monitor.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterStats {
    /// Events accepted by `publish`
    pub events_published: u64,
    /// Events taken off the queue and handed to subscribers
    pub events_delivered: u64,
    /// Handler invocations that returned an error or panicked
    pub handler_failures: u64,
    /// Number of registered handlers across all event kinds
    pub total_handlers: usize,
    /// Events waiting for delivery
    pub queue_depth: usize,
}

/// Lock-free counters updated from publisher threads and the dispatch thread.
#[derive(Debug, Default)]
pub(super) struct StatsCounters {
    pub(super) published: AtomicU64,
    pub(super) delivered: AtomicU64,
    pub(super) failures: AtomicU64,
}

impl StatsCounters {
    pub(super) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn snapshot(&self, total_handlers: usize, queue_depth: usize) -> RouterStats {
        RouterStats {
            events_published: self.published.load(Ordering::Relaxed),
            events_delivered: self.delivered.load(Ordering::Relaxed),
            handler_failures: self.failures.load(Ordering::Relaxed),
            total_handlers,
            queue_depth,
        }
    }
}
