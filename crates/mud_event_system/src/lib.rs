//! # MUD Event System
//!
//! Ordered publish/subscribe routing between the telnet connection layer and
//! whatever gives meaning to the lines players type.
//!
//! The connection layer only knows bytes and lines. It publishes
//! [`Event::IncomingMessage`] for every completed line and lifecycle events
//! when sockets come and go. Subscribers (command interpreters, chat, timers)
//! answer by publishing [`Event::OutgoingMessage`], [`Event::Broadcast`],
//! [`Event::Gossip`] or [`Event::Disconnect`], which the server turns back
//! into bytes on the wire.
//!
//! ## Delivery guarantees
//!
//! - Events are delivered in the order they were published, one at a time,
//!   on a single dispatch thread.
//! - Handlers for one kind run in subscription order.
//! - A handler that fails or panics is logged and counted; it never stops
//!   delivery to other handlers or of later events.
//! - Publishing never blocks on delivery, so handlers may publish.
//!
//! ## Quick Start
//!
//! ```rust
//! use mud_event_system::{Event, EventKind, EventRouter};
//! use std::sync::Arc;
//!
//! let router = Arc::new(EventRouter::new());
//! let replies = router.clone();
//! router.subscribe(EventKind::IncomingMessage, "echo", move |event| {
//!     if let Event::IncomingMessage { id, text } = event {
//!         replies.publish(Event::outgoing(*id, text.clone()))?;
//!     }
//!     Ok(())
//! });
//!
//! router.publish(Event::IncomingMessage { id: 1, text: "look".into() }).unwrap();
//! router.dispatch_pending();
//! assert_eq!(router.stats().events_published, 2);
//! ```

pub mod events;
pub mod router;
pub mod shutdown;
pub mod utils;

pub use events::{ConnectionId, DisconnectReason, Event, EventError, EventKind};
pub use router::{EventHandler, EventRouter, RouterStats};
pub use shutdown::ShutdownState;
pub use utils::current_timestamp;
