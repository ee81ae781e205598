//! Error types and handling for the telnet server.
//!
//! Server-level errors are process-fatal at startup. Connection-level errors
//! only ever close the one connection they belong to.

/// Enumeration of possible server errors.
///
/// Categorizes errors into network-related and internal server errors
/// to help with debugging and error handling.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Network-related errors such as binding failures
    #[error("Network error: {0}")]
    Network(String),

    /// Internal server errors including thread spawn and event router failures
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors scoped to a single connection. Every variant closes that connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The client sent a line longer than `max_line_length`
    #[error("input line exceeded {limit} bytes")]
    InputOverflow { limit: usize },

    /// More than `max_outgoing_queue` units were waiting to be written
    #[error("outgoing queue exceeded {limit} units")]
    OutputOverflow { limit: usize },

    /// The socket failed while reading or writing
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}
