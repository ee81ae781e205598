//! The thread-safe half of a connection.

use super::Outgoing;
use crate::error::ConnectionError;
use crossbeam::channel::Sender;
use mud_event_system::ConnectionId;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{trace, warn};

/// Tells the reactor that a connection needs attention.
///
/// The id goes onto a channel the reactor drains every turn; the waker
/// interrupts a poll that would otherwise sleep until its timeout.
#[derive(Debug, Clone)]
pub struct WriteNotifier {
    sender: Sender<ConnectionId>,
    waker: Arc<mio::Waker>,
}

impl WriteNotifier {
    pub fn new(sender: Sender<ConnectionId>, waker: Arc<mio::Waker>) -> Self {
        Self { sender, waker }
    }

    pub fn notify(&self, id: ConnectionId) {
        if self.sender.send(id).is_err() {
            trace!("Reactor gone, dropping notification for {}", id);
            return;
        }
        if let Err(e) = self.waker.wake() {
            warn!("⚠️ Failed to wake reactor for connection {}: {}", id, e);
        }
    }
}

/// Outgoing queue and close flags shared between the reactor and the
/// dispatch thread.
///
/// Enqueueing is a short critical section on one connection's queue; there
/// is no lock spanning several connections.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    remote_addr: SocketAddr,
    outgoing: Mutex<VecDeque<Outgoing>>,
    max_queue: usize,
    /// Cleared when the connection starts closing; enqueues become no-ops
    accepting: AtomicBool,
    overflowed: AtomicBool,
    close_requested: AtomicBool,
    notifier: Option<WriteNotifier>,
}

impl ConnectionHandle {
    /// Creates a handle. Without a notifier the owner must poll for output.
    pub fn new(
        id: ConnectionId,
        remote_addr: SocketAddr,
        max_queue: usize,
        notifier: Option<WriteNotifier>,
    ) -> Self {
        Self {
            id,
            remote_addr,
            outgoing: Mutex::new(VecDeque::new()),
            max_queue,
            accepting: AtomicBool::new(true),
            overflowed: AtomicBool::new(false),
            close_requested: AtomicBool::new(false),
            notifier,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Appends one output unit.
    ///
    /// Returns `Ok(false)` without queueing anything once the connection is
    /// closing. Going past the queue limit marks the connection overflowed
    /// and the reactor closes it.
    pub fn enqueue(&self, unit: Outgoing) -> Result<bool, ConnectionError> {
        if !self.is_accepting() {
            trace!("Dropping output for closing connection {}", self.id);
            return Ok(false);
        }

        {
            let mut queue = self.queue();
            if queue.len() >= self.max_queue {
                drop(queue);
                self.accepting.store(false, Ordering::Release);
                self.overflowed.store(true, Ordering::Release);
                self.notify();
                return Err(ConnectionError::OutputOverflow {
                    limit: self.max_queue,
                });
            }
            queue.push_back(unit);
        }

        self.notify();
        Ok(true)
    }

    /// Queues a line of text.
    pub fn send_line(&self, text: impl Into<String>) -> Result<bool, ConnectionError> {
        self.enqueue(Outgoing::Line(text.into()))
    }

    /// Asks the reactor to close the connection once queued output is written.
    pub fn request_close(&self) {
        if !self.close_requested.swap(true, Ordering::AcqRel) {
            self.accepting.store(false, Ordering::Release);
            self.notify();
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Number of units waiting to be written.
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    pub(crate) fn pop_front(&self) -> Option<Outgoing> {
        self.queue().pop_front()
    }

    pub(crate) fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    pub(crate) fn has_overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Acquire)
    }

    pub(crate) fn is_close_requested(&self) -> bool {
        self.close_requested.load(Ordering::Acquire)
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Outgoing>> {
        self.outgoing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(self.id);
        }
    }
}
