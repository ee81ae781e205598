//! Connection management for telnet clients.
//!
//! A [`Connection`] owns its socket and is only ever touched by the reactor
//! thread. The part other threads may use, the outgoing queue, lives in a
//! shared [`ConnectionHandle`] that the [`ConnectionRegistry`] hands out.

pub mod client;
pub mod framing;
pub mod handle;
pub mod registry;

pub use client::{Connection, ReadProgress, WriteProgress};
pub use framing::{Framing, LineFraming, PlainFraming, RedrawFraming};
pub use handle::{ConnectionHandle, WriteNotifier};
pub use registry::ConnectionRegistry;

use std::fmt;

/// Lifecycle of a connection.
///
/// `Negotiating` only lasts until the negotiation requests are queued.
/// `Closing` flushes queued output and accepts nothing new. `Closed` is
/// terminal; the reactor removes the connection on its next sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Negotiating,
    Active,
    Closing,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Negotiating => "negotiating",
            ConnectionState::Active => "active",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One unit of pending output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Protocol bytes, written verbatim and never framed
    Raw(Vec<u8>),
    /// A line of text, framed by the connection's line policy
    Line(String),
}
