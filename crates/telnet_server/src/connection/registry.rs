//! Registry of live connections, keyed by connection id.
//!
//! Only the reactor inserts and removes entries. Everyone else reads, and
//! fan-out works from a snapshot so a connection that closes halfway through
//! a broadcast is simply skipped.

use super::handle::ConnectionHandle;
use dashmap::DashMap;
use mud_event_system::ConnectionId;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, handle: Arc<ConnectionHandle>) {
        self.connections.insert(handle.id(), handle);
    }

    pub(crate) fn remove(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.remove(&id).map(|(_, handle)| handle)
    }

    /// Looks up a single connection.
    pub fn get(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Every registered connection at this instant, ordered by id.
    pub fn snapshot(&self) -> Vec<Arc<ConnectionHandle>> {
        let mut handles: Vec<_> = self
            .connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        handles.sort_by_key(|handle| handle.id());
        handles
    }
}
