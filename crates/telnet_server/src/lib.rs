//! # Telnet Server
//!
//! The network core of a multi-user text server. It accepts telnet clients,
//! refuses every telnet option they propose, turns their byte streams into
//! lines, and routes lines through the [`mud_event_system`] router.
//!
//! ## Design Philosophy
//!
//! The server contains **no command logic**. Every completed input line is
//! published as an `IncomingMessage` event; subscribers answer with
//! `OutgoingMessage`, `Broadcast`, `Gossip` or `Disconnect` events, which the
//! server's outbound handlers turn back into bytes on the wire.
//!
//! ## Architecture Overview
//!
//! * **Listener** - accepts sockets on its own thread and queues them
//! * **Reactor** - one thread owning every client socket, driven by `mio`
//!   readiness events, with per-turn read budgets so a busy client cannot
//!   starve the rest
//! * **Connection** - telnet state machine: option refusal, line assembly,
//!   bounded input and output
//! * **ConnectionRegistry** - id to connection-handle map used for fan-out
//!
//! ## Message Flow
//!
//! 1. Client bytes arrive and the reactor reads them
//! 2. The connection answers telnet commands and assembles lines
//! 3. The reactor publishes one `IncomingMessage` per completed line
//! 4. Subscribers publish replies
//! 5. Outbound handlers queue the replies on the target connections
//! 6. The reactor writes them out on the next turn
//!
//! ## Example
//!
//! ```rust,no_run
//! use mud_event_system::{Event, EventKind, EventRouter};
//! use std::sync::Arc;
//! use telnet_server::{ServerConfig, TelnetServer};
//!
//! let router = Arc::new(EventRouter::new());
//! let replies = router.clone();
//! router.subscribe(EventKind::IncomingMessage, "echo", move |event| {
//!     if let Event::IncomingMessage { id, text } = event {
//!         replies.publish(Event::outgoing(*id, format!("You said: {text}")))?;
//!     }
//!     Ok(())
//! });
//!
//! let server = TelnetServer::new(ServerConfig::default(), router.clone());
//! router.start().unwrap();
//! let addr = server.start().unwrap();
//! println!("listening on {addr}");
//! ```

pub use config::{FramingMode, GossipConfig, ServerConfig};
pub use connection::{ConnectionHandle, ConnectionRegistry, ConnectionState, Outgoing};
pub use error::{ConnectionError, ServerError};
pub use server::TelnetServer;
pub use utils::{create_server, create_server_with_config};

pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod server;
pub mod utils;
