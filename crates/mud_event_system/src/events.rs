//! Event definitions for the MUD event router.
//!
//! Every message that crosses the boundary between connection I/O and message
//! semantics is an [`Event`]. Events are immutable once published; subscribers
//! receive them by reference and may publish further events in response.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Stable identity of a client connection.
///
/// Assigned when the socket is accepted and used as the routing key in every
/// event. Identifiers are never reused while the connection is open.
pub type ConnectionId = u64;

/// Reason a connection left the server.
///
/// Carried by [`Event::ConnectionClosed`] so that subscribers can tell a
/// normal logout apart from a protocol or resource violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// Remote end closed the socket (end of stream)
    ClientDisconnect,
    /// A subscriber asked for the connection to be closed
    Requested,
    /// Client sent a line longer than the configured limit
    InputOverflow,
    /// Too much output queued for a client that is not reading
    OutputOverflow,
    /// Server is shutting down gracefully
    ServerShutdown,
    /// A read or write failed on the socket
    Error(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::ClientDisconnect => write!(f, "client disconnected"),
            DisconnectReason::Requested => write!(f, "close requested"),
            DisconnectReason::InputOverflow => write!(f, "input line too long"),
            DisconnectReason::OutputOverflow => write!(f, "output queue full"),
            DisconnectReason::ServerShutdown => write!(f, "server shutdown"),
            DisconnectReason::Error(e) => write!(f, "I/O error: {e}"),
        }
    }
}

/// A routed event.
///
/// Lifecycle events (`ConnectionOpened`, `ConnectionClosed`) and completed
/// input lines (`IncomingMessage`) are published by the reactor. Everything
/// else is published by subscribers and consumed by the server's outbound
/// handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A connection finished negotiation and joined the registry
    ConnectionOpened {
        id: ConnectionId,
        remote_addr: SocketAddr,
        timestamp: u64,
    },
    /// A connection left the registry; nothing is delivered to it afterwards
    ConnectionClosed {
        id: ConnectionId,
        reason: DisconnectReason,
        timestamp: u64,
    },
    /// A completed line of input from a client
    IncomingMessage { id: ConnectionId, text: String },
    /// A line of output for a single client
    OutgoingMessage { id: ConnectionId, text: String },
    /// A line of output for every connected client
    Broadcast { text: String },
    /// A chat line relayed to every connected client on behalf of `id`
    Gossip { id: ConnectionId, text: String },
    /// Ask for `id` to be closed once its pending output has been flushed
    Disconnect { id: ConnectionId },
}

/// Discriminant of [`Event`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ConnectionOpened,
    ConnectionClosed,
    IncomingMessage,
    OutgoingMessage,
    Broadcast,
    Gossip,
    Disconnect,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 7] = [
        EventKind::ConnectionOpened,
        EventKind::ConnectionClosed,
        EventKind::IncomingMessage,
        EventKind::OutgoingMessage,
        EventKind::Broadcast,
        EventKind::Gossip,
        EventKind::Disconnect,
    ];

    /// Short name used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ConnectionOpened => "connection_opened",
            EventKind::ConnectionClosed => "connection_closed",
            EventKind::IncomingMessage => "incoming_message",
            EventKind::OutgoingMessage => "outgoing_message",
            EventKind::Broadcast => "broadcast",
            EventKind::Gossip => "gossip",
            EventKind::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    /// Returns the subscription key for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ConnectionOpened { .. } => EventKind::ConnectionOpened,
            Event::ConnectionClosed { .. } => EventKind::ConnectionClosed,
            Event::IncomingMessage { .. } => EventKind::IncomingMessage,
            Event::OutgoingMessage { .. } => EventKind::OutgoingMessage,
            Event::Broadcast { .. } => EventKind::Broadcast,
            Event::Gossip { .. } => EventKind::Gossip,
            Event::Disconnect { .. } => EventKind::Disconnect,
        }
    }

    /// The connection this event refers to, if any.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        match self {
            Event::ConnectionOpened { id, .. }
            | Event::ConnectionClosed { id, .. }
            | Event::IncomingMessage { id, .. }
            | Event::OutgoingMessage { id, .. }
            | Event::Gossip { id, .. }
            | Event::Disconnect { id } => Some(*id),
            Event::Broadcast { .. } => None,
        }
    }

    /// Convenience constructor for a direct reply.
    pub fn outgoing(id: ConnectionId, text: impl Into<String>) -> Self {
        Event::OutgoingMessage {
            id,
            text: text.into(),
        }
    }

    /// Convenience constructor for a broadcast.
    pub fn broadcast(text: impl Into<String>) -> Self {
        Event::Broadcast { text: text.into() }
    }
}

/// Errors that can occur while publishing or handling events.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// A handler returned an error while processing an event
    #[error("Handler execution error: {0}")]
    HandlerExecution(String),
    /// A handler panicked while processing an event
    #[error("Handler panicked: {0}")]
    HandlerPanicked(String),
    /// The router has been shut down and no longer accepts events
    #[error("Event router has been stopped")]
    RouterStopped,
    /// Runtime error while starting or stopping the dispatch thread
    #[error("Runtime error: {0}")]
    RuntimeError(String),
    #[error("An unexpected error occurred: {0}")]
    Other(String),
}
