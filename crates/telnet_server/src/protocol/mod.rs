//! Wire protocol helpers.
//!
//! Only the telnet command layer lives here; line assembly belongs to the
//! connection state machine.

pub mod telnet;

pub use telnet::{parse_command, Command, FramingError};
