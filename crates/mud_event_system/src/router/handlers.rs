/// Event handler registration methods
use super::core::EventRouter;
use crate::events::{Event, EventError, EventKind};
use std::sync::Arc;
use tracing::info;

/// Signature shared by every subscriber callback.
pub type EventHandler = dyn Fn(&Event) -> Result<(), EventError> + Send + Sync;

/// A named handler as stored in the subscription table.
pub(super) struct RegisteredHandler {
    pub(super) name: String,
    pub(super) callback: Arc<EventHandler>,
}

impl EventRouter {
    /// Registers `handler` for every future event of `kind`.
    ///
    /// Handlers for the same kind run in registration order on the dispatch
    /// thread. `name` only appears in logs.
    pub fn subscribe<F>(&self, kind: EventKind, name: &str, handler: F)
    where
        F: Fn(&Event) -> Result<(), EventError> + Send + Sync + 'static,
    {
        self.subscribe_many(&[kind], name, handler);
    }

    /// Registers one handler for several kinds at once.
    pub fn subscribe_many<F>(&self, kinds: &[EventKind], name: &str, handler: F)
    where
        F: Fn(&Event) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let registered = Arc::new(RegisteredHandler {
            name: name.to_string(),
            callback: Arc::new(handler),
        });

        for kind in kinds {
            self.handlers
                .entry(*kind)
                .or_default()
                .push(Arc::clone(&registered));
            info!("📝 Registered handler '{}' for {}", name, kind);
        }
    }

    /// Number of handlers subscribed to `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map(|entry| entry.len()).unwrap_or(0)
    }

    /// Number of handlers across every kind.
    pub fn total_handlers(&self) -> usize {
        self.handlers.iter().map(|entry| entry.value().len()).sum()
    }
}
