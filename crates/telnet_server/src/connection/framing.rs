//! Line framing policies for outgoing text.

use crate::config::FramingMode;
use crate::protocol::telnet::{CRLF, IAC};

/// Clears the whole current terminal line (ANSI EL 2).
const ERASE_LINE: &[u8] = b"\x1b[2K";

/// Turns one line of text into the bytes written to the client.
pub trait LineFraming {
    /// Appends the framed form of `text` to `out`.
    ///
    /// `pending_input` is what the client has typed but not yet submitted.
    fn frame_line(&self, text: &str, pending_input: &[u8], out: &mut Vec<u8>);
}

/// `text` followed by CRLF.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFraming;

impl LineFraming for PlainFraming {
    fn frame_line(&self, text: &str, _pending_input: &[u8], out: &mut Vec<u8>) {
        out.extend_from_slice(text.as_bytes());
        out.extend_from_slice(&CRLF);
    }
}

/// Writes over the prompt line, then restores the prompt and partial input
/// underneath so output never splices into what the user is typing.
#[derive(Debug, Clone, Default)]
pub struct RedrawFraming {
    prompt: String,
}

impl RedrawFraming {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

impl LineFraming for RedrawFraming {
    fn frame_line(&self, text: &str, pending_input: &[u8], out: &mut Vec<u8>) {
        out.push(b'\r');
        out.extend_from_slice(ERASE_LINE);
        out.extend_from_slice(text.as_bytes());
        out.extend_from_slice(&CRLF);
        out.extend_from_slice(self.prompt.as_bytes());
        for &byte in pending_input {
            // A data 0xFF goes back on the wire escaped.
            if byte == IAC {
                out.push(IAC);
            }
            out.push(byte);
        }
    }
}

/// Framing chosen from configuration.
#[derive(Debug, Clone)]
pub enum Framing {
    Plain(PlainFraming),
    Redraw(RedrawFraming),
}

impl Framing {
    pub fn from_mode(mode: FramingMode, prompt: &str) -> Self {
        match mode {
            FramingMode::Plain => Framing::Plain(PlainFraming),
            FramingMode::Redraw => Framing::Redraw(RedrawFraming::new(prompt)),
        }
    }
}

impl Default for Framing {
    fn default() -> Self {
        Framing::Plain(PlainFraming)
    }
}

impl LineFraming for Framing {
    fn frame_line(&self, text: &str, pending_input: &[u8], out: &mut Vec<u8>) {
        match self {
            Framing::Plain(framing) => framing.frame_line(text, pending_input, out),
            Framing::Redraw(framing) => framing.frame_line(text, pending_input, out),
        }
    }
}
