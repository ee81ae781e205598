/// Core EventRouter implementation
use super::handlers::RegisteredHandler;
use super::stats::{RouterStats, StatsCounters};
use crate::events::{Event, EventError, EventKind};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long the dispatch thread sleeps on an empty queue before re-checking
/// the stop flag.
const DISPATCH_IDLE_WAIT: Duration = Duration::from_millis(100);

/// Ordered, single-consumer event router.
///
/// Publishers on any thread push events onto an unbounded queue; one dispatch
/// thread pops them in FIFO order and hands each to the handlers subscribed
/// to its [`EventKind`], in subscription order. Publishing never waits for
/// delivery, so a handler may publish follow-up events without deadlocking.
///
/// A failing or panicking handler is logged and counted; the remaining
/// handlers still see the event and delivery continues with the next one.
pub struct EventRouter {
    /// Subscription table: event kind to ordered handler list
    pub(super) handlers: DashMap<EventKind, Vec<Arc<RegisteredHandler>>>,
    pub(super) sender: Sender<Event>,
    pub(super) receiver: Receiver<Event>,
    pub(super) stats: StatsCounters,
    /// Set by `shutdown`; `publish` refuses new events afterwards
    pub(super) stopped: AtomicBool,
    dispatch_thread: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("handlers", &self.total_handlers())
            .field("queue_depth", &self.receiver.len())
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish()
    }
}

impl EventRouter {
    /// Creates a router with no subscribers and no dispatch thread.
    pub fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            handlers: DashMap::new(),
            sender,
            receiver,
            stats: StatsCounters::default(),
            stopped: AtomicBool::new(false),
            dispatch_thread: Mutex::new(None),
        }
    }

    /// Spawns the dispatch thread.
    ///
    /// Events published before `start` stay queued and are delivered first.
    pub fn start(self: &Arc<Self>) -> Result<(), EventError> {
        let mut slot = self
            .dispatch_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(EventError::RuntimeError(
                "dispatch thread already running".to_string(),
            ));
        }
        if self.is_stopped() {
            return Err(EventError::RouterStopped);
        }

        let router = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("event-dispatch".to_string())
            .spawn(move || router.run_dispatch_loop())
            .map_err(|e| EventError::RuntimeError(format!("failed to spawn dispatch thread: {e}")))?;

        *slot = Some(handle);
        Ok(())
    }

    /// Stops accepting events, delivers everything already queued, then
    /// joins the dispatch thread.
    ///
    /// Safe to call from inside a handler; in that case the dispatch thread
    /// exits on its own once the queue is empty.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("📪 Event router stopping ({} events queued)", self.receiver.len());

        let handle = self
            .dispatch_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match handle {
            Some(handle) if handle.thread().id() == thread::current().id() => {
                debug!("Router shutdown requested from the dispatch thread");
            }
            Some(handle) => {
                if handle.join().is_err() {
                    warn!("⚠️ Event dispatch thread terminated abnormally");
                }
            }
            None => {
                self.dispatch_pending();
            }
        }
    }

    /// True once `shutdown` has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Returns a snapshot of router activity.
    pub fn stats(&self) -> RouterStats {
        self.stats
            .snapshot(self.total_handlers(), self.receiver.len())
    }

    fn run_dispatch_loop(&self) {
        info!("📬 Event dispatch thread started");
        loop {
            match self.receiver.recv_timeout(DISPATCH_IDLE_WAIT) {
                Ok(event) => self.deliver(&event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if self.is_stopped() && self.receiver.is_empty() {
                break;
            }
        }

        // Anything that slipped in between the last check and the stop flag.
        let drained = self.dispatch_pending();
        if drained > 0 {
            debug!("Delivered {} trailing events during shutdown", drained);
        }
        info!("📪 Event dispatch thread stopped");
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}
