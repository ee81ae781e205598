//! Telnet command recognition and the refusal responses the server sends.
//!
//! The server accepts no telnet options: every `WILL x` is answered with
//! `DONT x` and every `DO x` with `WONT x`. Declines from the peer are taken
//! silently so the two sides cannot bounce refusals back and forth.
//!
//! Everything here is a pure function over a byte window. Nothing is kept
//! between calls; a command split across two reads is the caller's to hold.

use tracing::trace;

/// Interpret As Command: introduces every command sequence.
pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
/// Subnegotiation begin
pub const SB: u8 = 250;
pub const GA: u8 = 249;
pub const EL: u8 = 248;
pub const EC: u8 = 247;
pub const AYT: u8 = 246;
pub const NOP: u8 = 241;
/// Subnegotiation end, the lowest defined command byte
pub const SE: u8 = 240;

/// Option: echo
pub const ECHO: u8 = 1;
/// Option: suppress go-ahead
pub const SUPPRESS_GO_AHEAD: u8 = 3;

pub const NUL: u8 = 0;
pub const BS: u8 = 8;
pub const LF: u8 = 10;
pub const CR: u8 = 13;
pub const DEL: u8 = 127;
pub const CRLF: [u8; 2] = [CR, LF];

/// The command sequence could not be recognized from the bytes at hand.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// More bytes are needed; retry once the next read arrives
    #[error("incomplete telnet command: need {needed} bytes, have {available}")]
    Incomplete { needed: usize, available: usize },

    /// The window does not start with `IAC`
    #[error("byte {0} does not introduce a telnet command")]
    NotACommand(u8),
}

/// A complete command sequence found at the head of a byte window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `IAC IAC`: a literal 255 in the data stream
    Escaped,
    /// `IAC WILL|WONT|DO|DONT option`
    Negotiation { verb: u8, option: u8 },
    /// `IAC x` for x in 240..=250
    Control(u8),
    /// `IAC x` for x below 240, which telnet leaves undefined
    Unknown(u8),
}

impl Command {
    /// Number of bytes the sequence occupies on the wire.
    pub fn wire_len(&self) -> usize {
        match self {
            Command::Negotiation { .. } => 3,
            Command::Escaped | Command::Control(_) | Command::Unknown(_) => 2,
        }
    }

    /// The bytes the server sends back, if any.
    ///
    /// `WILL`/`DO` are refused, control commands get a bare CRLF, and
    /// everything else passes without a reply.
    pub fn reply(&self) -> Option<Vec<u8>> {
        match *self {
            Command::Negotiation { verb, option } => {
                refuse_option(verb, option).map(|response| response.to_vec())
            }
            Command::Control(_) => Some(CRLF.to_vec()),
            Command::Escaped | Command::Unknown(_) => None,
        }
    }
}

/// True for the four verbs that carry an option byte.
pub fn is_option_verb(byte: u8) -> bool {
    matches!(byte, WILL | WONT | DO | DONT)
}

/// Recognizes the command at the head of `window`.
///
/// `window[0]` must be `IAC`. Two bytes are enough for everything except the
/// option verbs, which need three.
pub fn parse_command(window: &[u8]) -> Result<Command, FramingError> {
    match window.first() {
        None => {
            return Err(FramingError::Incomplete {
                needed: 2,
                available: 0,
            })
        }
        Some(&IAC) => {}
        Some(&other) => return Err(FramingError::NotACommand(other)),
    }

    let Some(&verb) = window.get(1) else {
        return Err(FramingError::Incomplete {
            needed: 2,
            available: window.len(),
        });
    };

    let command = match verb {
        IAC => Command::Escaped,
        v if is_option_verb(v) => match window.get(2) {
            Some(&option) => Command::Negotiation { verb, option },
            None => {
                return Err(FramingError::Incomplete {
                    needed: 3,
                    available: window.len(),
                })
            }
        },
        SE..=SB => Command::Control(verb),
        other => Command::Unknown(other),
    };

    trace!("🔧 Telnet command {:?}", command);
    Ok(command)
}

/// The permanent refusal for an option request.
///
/// `DO x` becomes `IAC WONT x`, `WILL x` becomes `IAC DONT x`. Declines
/// (`WONT`, `DONT`) need no answer and yield `None`.
pub fn refuse_option(verb: u8, option: u8) -> Option<[u8; 3]> {
    match verb {
        DO => Some([IAC, WONT, option]),
        WILL => Some([IAC, DONT, option]),
        _ => None,
    }
}

/// Requests sent to every client on connect: no remote echo, local echo
/// offered, and go-ahead suppressed in both directions.
pub fn negotiation_requests() -> [[u8; 3]; 4] {
    [
        [IAC, DONT, ECHO],
        [IAC, WILL, ECHO],
        [IAC, DO, SUPPRESS_GO_AHEAD],
        [IAC, WILL, SUPPRESS_GO_AHEAD],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_option_request_is_refused() {
        for option in 0..=255u8 {
            let will = parse_command(&[IAC, WILL, option]).unwrap();
            assert_eq!(will.reply(), Some(vec![IAC, DONT, option]));

            let do_ = parse_command(&[IAC, DO, option]).unwrap();
            assert_eq!(do_.reply(), Some(vec![IAC, WONT, option]));
        }
    }

    #[test]
    fn test_declines_get_no_reply() {
        for verb in [WONT, DONT] {
            let command = parse_command(&[IAC, verb, ECHO]).unwrap();
            assert_eq!(command, Command::Negotiation { verb, option: ECHO });
            assert_eq!(command.wire_len(), 3);
            assert_eq!(command.reply(), None);
        }
    }

    #[test]
    fn test_control_commands_are_acknowledged_with_crlf() {
        for verb in SE..=SB {
            let command = parse_command(&[IAC, verb, b'x']).unwrap();
            assert_eq!(command, Command::Control(verb));
            assert_eq!(command.wire_len(), 2);
            assert_eq!(command.reply(), Some(CRLF.to_vec()));
        }
    }

    #[test]
    fn test_escaped_iac_and_unknown_commands() {
        let escaped = parse_command(&[IAC, IAC]).unwrap();
        assert_eq!(escaped, Command::Escaped);
        assert_eq!(escaped.wire_len(), 2);
        assert_eq!(escaped.reply(), None);

        let unknown = parse_command(&[IAC, 17]).unwrap();
        assert_eq!(unknown, Command::Unknown(17));
        assert_eq!(unknown.wire_len(), 2);
        assert_eq!(unknown.reply(), None);
    }

    #[test]
    fn test_incomplete_sequences() {
        assert_eq!(
            parse_command(&[]),
            Err(FramingError::Incomplete { needed: 2, available: 0 })
        );
        assert_eq!(
            parse_command(&[IAC]),
            Err(FramingError::Incomplete { needed: 2, available: 1 })
        );
        assert_eq!(
            parse_command(&[IAC, DO]),
            Err(FramingError::Incomplete { needed: 3, available: 2 })
        );
        // A control command is complete at two bytes.
        assert_eq!(parse_command(&[IAC, AYT]), Ok(Command::Control(AYT)));
    }

    #[test]
    fn test_window_must_start_with_iac() {
        assert_eq!(parse_command(b"look"), Err(FramingError::NotACommand(b'l')));
    }

    #[test]
    fn test_negotiation_request_order() {
        let requests = negotiation_requests();
        assert_eq!(requests[0], [255, 254, 1]);
        assert_eq!(requests[1], [255, 251, 1]);
        assert_eq!(requests[2], [255, 253, 3]);
        assert_eq!(requests[3], [255, 251, 3]);
    }
}
