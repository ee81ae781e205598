/// Event publication and delivery
use super::core::EventRouter;
use crate::events::{Event, EventError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, trace};

impl EventRouter {
    /// Queues `event` for delivery.
    ///
    /// Never blocks on delivery and may be called from any thread, including
    /// from inside a handler.
    pub fn publish(&self, event: Event) -> Result<(), EventError> {
        if self.is_stopped() {
            return Err(EventError::RouterStopped);
        }

        trace!("📤 Publishing {}", event.kind());
        self.sender
            .send(event)
            .map_err(|_| EventError::RouterStopped)?;
        self.stats.record_published();
        Ok(())
    }

    /// Delivers every queued event on the calling thread and returns how
    /// many were delivered.
    ///
    /// Intended for embedding without a dispatch thread; calling it while the
    /// dispatch thread runs splits delivery across two consumers.
    pub fn dispatch_pending(&self) -> usize {
        let mut delivered = 0;
        while let Ok(event) = self.receiver.try_recv() {
            self.deliver(&event);
            delivered += 1;
        }
        delivered
    }

    /// Hands one event to each subscribed handler in order.
    pub(super) fn deliver(&self, event: &Event) {
        let kind = event.kind();

        // Clone the list so handlers can subscribe without holding the shard lock.
        let handlers = self.handlers.get(&kind).map(|entry| entry.value().clone());
        self.stats.record_delivered();

        let Some(handlers) = handlers else {
            trace!("No handlers for event: {}", kind);
            return;
        };
        match event.connection_id() {
            Some(id) => trace!("Delivering {} for connection {} to {} handlers", kind, id, handlers.len()),
            None => trace!("Delivering {} to {} handlers", kind, handlers.len()),
        }

        for handler in handlers.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (handler.callback)(event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.stats.record_failure();
                    error!("❌ Handler '{}' failed on {}: {}", handler.name, kind, e);
                }
                Err(payload) => {
                    self.stats.record_failure();
                    let failure = EventError::HandlerPanicked(panic_message(payload.as_ref()));
                    error!("❌ Handler '{}' failed on {}: {}", handler.name, kind, failure);
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
