//! Core server implementation: accept thread, reactor and outbound handlers.
//!
//! The listener accepts sockets and queues them for the reactor. The reactor
//! owns every socket, drives reads and writes from readiness events, and
//! publishes completed lines. Handlers running on the event dispatch thread
//! turn outbound events back into queued output.

pub mod core;
pub mod handlers;
mod listener;
mod reactor;

pub use self::core::TelnetServer;
pub use handlers::register_outbound_handlers;
