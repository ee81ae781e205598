//! Utility functions and helper methods for the telnet server.
//!
//! Factory functions for creating servers with their own event router.

use crate::{config::ServerConfig, server::TelnetServer};
use mud_event_system::EventRouter;
use std::sync::Arc;

/// Creates a new telnet server with default configuration and a fresh
/// event router.
///
/// # Example
///
/// ```rust
/// use telnet_server::create_server;
///
/// let server = create_server();
/// assert_eq!(server.connection_count(), 0);
/// ```
pub fn create_server() -> TelnetServer {
    create_server_with_config(ServerConfig::default())
}

/// Creates a new telnet server with custom configuration and a fresh
/// event router. Use [`TelnetServer::get_event_router`] to subscribe.
///
/// # Example
///
/// ```rust
/// use telnet_server::{create_server_with_config, ServerConfig};
///
/// let config = ServerConfig {
///     bind_address: "127.0.0.1:0".parse().unwrap(),
///     max_connections: 50,
///     ..Default::default()
/// };
///
/// let server = create_server_with_config(config);
/// assert_eq!(server.config().max_connections, 50);
/// ```
pub fn create_server_with_config(config: ServerConfig) -> TelnetServer {
    TelnetServer::new(config, Arc::new(EventRouter::new()))
}
