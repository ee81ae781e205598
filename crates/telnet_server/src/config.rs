//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize and tune the telnet server.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// How outgoing text lines are decorated before they reach the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramingMode {
    /// `text` followed by CRLF
    #[default]
    Plain,
    /// Erase the current terminal line, write `text`, then redraw the prompt
    /// and whatever the client has typed so far
    Redraw,
}

/// Configuration structure for the telnet server.
///
/// Contains network settings, per-connection limits and reactor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Size of the buffer used for a single socket read
    pub read_buffer_size: usize,

    /// Reads per connection per reactor turn before moving on to the next one
    pub read_budget: usize,

    /// Longest input line accepted before the connection is dropped
    pub max_line_length: usize,

    /// Most output units a connection may have queued before it is dropped
    pub max_outgoing_queue: usize,

    /// Upper bound on how long the reactor sleeps when there is nothing to do
    pub poll_timeout_ms: u64,

    /// Send the option negotiation sequence when a client connects
    pub negotiate_on_connect: bool,

    /// Output line framing
    pub framing: FramingMode,

    /// Prompt redrawn after each line in `Redraw` mode
    pub prompt: String,

    /// Gossip fan-out settings
    pub gossip: GossipConfig,
}

/// Gossip relay settings, the `[gossip]` table of the server config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipConfig {
    /// Whether `Gossip` events are fanned out at all
    pub enabled: bool,

    /// Whether the sender receives its own gossip
    pub echo_to_sender: bool,

    /// Line format; `{id}` and `{text}` are substituted
    pub format: String,
}

impl GossipConfig {
    /// Renders one gossip line.
    pub fn render(&self, id: u64, text: &str) -> String {
        self.format
            .replace("{id}", &id.to_string())
            .replace("{text}", text)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 2323)),
            max_connections: 1000,
            read_buffer_size: 1024,
            read_budget: 16,
            max_line_length: 4096,
            max_outgoing_queue: 1024,
            poll_timeout_ms: 50,
            negotiate_on_connect: true,
            framing: FramingMode::Plain,
            prompt: "> ".to_string(),
            gossip: GossipConfig::default(),
        }
    }
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            echo_to_sender: true,
            format: "{id} gossips: {text}".to_string(),
        }
    }
}
