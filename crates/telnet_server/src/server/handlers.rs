//! Outbound event handlers.
//!
//! These run on the event dispatch thread. They never touch sockets; they
//! only append to connection queues through the registry, and the reactor
//! does the writing.

use crate::config::GossipConfig;
use crate::connection::{ConnectionHandle, ConnectionRegistry};
use mud_event_system::{Event, EventKind, EventRouter};
use std::sync::Arc;
use tracing::{debug, warn};

/// Subscribes the handlers that deliver `OutgoingMessage`, `Broadcast`,
/// `Gossip` and `Disconnect` events to connections.
pub fn register_outbound_handlers(
    router: &EventRouter,
    registry: Arc<ConnectionRegistry>,
    gossip: GossipConfig,
) {
    let direct = Arc::clone(&registry);
    router.subscribe(EventKind::OutgoingMessage, "outbound_direct", move |event| {
        if let Event::OutgoingMessage { id, text } = event {
            match direct.get(*id) {
                Some(handle) => deliver(&handle, text),
                None => debug!("Dropping output for unknown connection {}", id),
            }
        }
        Ok(())
    });

    let broadcast = Arc::clone(&registry);
    router.subscribe(EventKind::Broadcast, "outbound_broadcast", move |event| {
        if let Event::Broadcast { text } = event {
            for handle in broadcast.snapshot() {
                deliver(&handle, text);
            }
        }
        Ok(())
    });

    if gossip.enabled {
        let relay = Arc::clone(&registry);
        router.subscribe(EventKind::Gossip, "outbound_gossip", move |event| {
            if let Event::Gossip { id, text } = event {
                let line = gossip.render(*id, text);
                for handle in relay.snapshot() {
                    if handle.id() == *id && !gossip.echo_to_sender {
                        continue;
                    }
                    deliver(&handle, &line);
                }
            }
            Ok(())
        });
    }

    router.subscribe(EventKind::Disconnect, "outbound_disconnect", move |event| {
        if let Event::Disconnect { id } = event {
            match registry.get(*id) {
                Some(handle) => handle.request_close(),
                None => debug!("Disconnect for unknown connection {}", id),
            }
        }
        Ok(())
    });
}

/// Best-effort delivery; an overflowing connection is closed by the reactor.
fn deliver(handle: &ConnectionHandle, text: &str) {
    if let Err(e) = handle.send_line(text) {
        warn!("⚠️ Connection {} dropped: {}", handle.id(), e);
    }
}
