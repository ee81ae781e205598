//! Per-socket telnet state machine.
//!
//! Input is consumed byte by byte: telnet commands are answered, line
//! terminators complete a line, everything else accumulates. Nothing here
//! cares how bytes are split across reads; a command cut off at the end of
//! one read is held and finished by the next.

use super::framing::{Framing, LineFraming};
use super::handle::ConnectionHandle;
use super::{ConnectionState, Outgoing};
use crate::error::ConnectionError;
use crate::protocol::telnet::{self, Command, FramingError, BS, CR, DEL, IAC, LF, NUL};
use mud_event_system::{ConnectionId, DisconnectReason};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Outcome of reading from the socket for one reactor turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadProgress {
    /// The socket would block; wait for the next readiness event
    Drained,
    /// The read budget ran out with data possibly still waiting
    BudgetExhausted,
    /// The connection is closed (end of stream, error or overflow)
    Closed,
}

/// Outcome of a single `drain_writable` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    /// Nothing was queued
    Idle,
    /// One unit went out completely; `remaining` are still queued
    Flushed { remaining: usize },
    /// The socket accepted part of the unit or none of it
    Blocked,
}

/// A unit that has been encoded and partly written.
#[derive(Debug)]
struct InFlight {
    bytes: Vec<u8>,
    written: usize,
}

/// A telnet client connection.
///
/// Generic over the byte stream so the state machine can be driven by
/// in-memory streams in tests, and over the line framing policy.
pub struct Connection<S, F = Framing> {
    handle: Arc<ConnectionHandle>,
    stream: S,
    framing: F,
    state: ConnectionState,
    max_line_length: usize,
    /// Bytes of the line being typed
    accumulator: Vec<u8>,
    /// Start of a command sequence that ended the previous read
    partial_command: Vec<u8>,
    /// The previous data byte was CR, so a following LF or NUL is swallowed
    after_cr: bool,
    incoming: VecDeque<String>,
    in_flight: Option<InFlight>,
    close_reason: Option<DisconnectReason>,
}

impl<S, F> std::fmt::Debug for Connection<S, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.handle.id())
            .field("state", &self.state)
            .field("buffered", &self.accumulator.len())
            .field("incoming", &self.incoming.len())
            .finish()
    }
}

impl<S: Read + Write, F: LineFraming> Connection<S, F> {
    /// Wraps an accepted stream. The connection starts in `Negotiating`;
    /// call [`open`](Self::open) before driving it.
    pub fn new(handle: Arc<ConnectionHandle>, stream: S, framing: F, max_line_length: usize) -> Self {
        Self {
            handle,
            stream,
            framing,
            state: ConnectionState::Negotiating,
            max_line_length,
            accumulator: Vec::new(),
            partial_command: Vec::new(),
            after_cr: false,
            incoming: VecDeque::new(),
            in_flight: None,
            close_reason: None,
        }
    }

    /// Queues the option negotiation requests (when `negotiate` is set) and
    /// moves to `Active`.
    pub fn open(&mut self, negotiate: bool) -> Result<(), ConnectionError> {
        if self.state != ConnectionState::Negotiating {
            return Ok(());
        }

        if negotiate {
            for request in telnet::negotiation_requests() {
                if let Err(e) = self.handle.enqueue(Outgoing::Raw(request.to_vec())) {
                    self.fail(&e);
                    return Err(e);
                }
            }
            trace!("🔧 Negotiation queued for connection {}", self.id());
        }

        self.state = ConnectionState::Active;
        Ok(())
    }

    pub fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn handle(&self) -> &Arc<ConnectionHandle> {
        &self.handle
    }

    /// Why the connection closed, once it has.
    pub fn close_reason(&self) -> Option<&DisconnectReason> {
        self.close_reason.as_ref()
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// True while an output unit is queued or half written.
    pub fn has_pending_output(&self) -> bool {
        self.in_flight.is_some() || self.handle.pending() > 0
    }

    /// Reads until the socket would block, reaches end of stream, or `budget`
    /// reads have been made, feeding everything to [`drain_readable`](Self::drain_readable).
    ///
    /// Errors close the connection and are reported as [`ReadProgress::Closed`].
    pub fn read_from_stream(&mut self, buffer: &mut [u8], budget: usize) -> ReadProgress {
        if self.state == ConnectionState::Closed {
            return ReadProgress::Closed;
        }

        let mut reads = 0;
        while reads < budget.max(1) {
            match self.stream.read(buffer) {
                Ok(0) => {
                    self.close(DisconnectReason::ClientDisconnect);
                    return ReadProgress::Closed;
                }
                Ok(n) => {
                    reads += 1;
                    trace!("📥 Read {} bytes from connection {}", n, self.id());
                    if self.drain_readable(&buffer[..n]).is_err() {
                        return ReadProgress::Closed;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return ReadProgress::Drained,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.fail(&ConnectionError::Io(e));
                    return ReadProgress::Closed;
                }
            }
        }
        ReadProgress::BudgetExhausted
    }

    /// Consumes `bytes` and returns how many lines were completed.
    ///
    /// Telnet replies go to the outgoing queue as raw units. A line longer
    /// than the limit or an output overflow closes the connection.
    pub fn drain_readable(&mut self, bytes: &[u8]) -> Result<usize, ConnectionError> {
        match self.consume(bytes) {
            Ok(completed) => Ok(completed),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Takes every completed line, oldest first.
    pub fn take_lines(&mut self) -> impl Iterator<Item = String> + '_ {
        self.incoming.drain(..)
    }

    /// Writes at most one queued unit.
    ///
    /// A unit the socket only partly accepts is kept and resumed by the next
    /// call. Calling this with nothing queued does nothing.
    pub fn drain_writable(&mut self) -> Result<WriteProgress, ConnectionError> {
        if self.state == ConnectionState::Closed {
            return Ok(WriteProgress::Idle);
        }

        let mut unit = match self.in_flight.take() {
            Some(unit) => unit,
            None => match self.handle.pop_front() {
                Some(next) => self.encode(next),
                None => {
                    self.finish_closing();
                    return Ok(WriteProgress::Idle);
                }
            },
        };

        while unit.written < unit.bytes.len() {
            match self.stream.write(&unit.bytes[unit.written..]) {
                Ok(0) => {
                    let e = ConnectionError::Io(io::Error::from(io::ErrorKind::WriteZero));
                    self.fail(&e);
                    return Err(e);
                }
                Ok(n) => unit.written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.in_flight = Some(unit);
                    return Ok(WriteProgress::Blocked);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let e = ConnectionError::Io(e);
                    self.fail(&e);
                    return Err(e);
                }
            }
        }

        let remaining = self.handle.pending();
        if remaining == 0 {
            self.finish_closing();
        }
        Ok(WriteProgress::Flushed { remaining })
    }

    /// Picks up changes other threads made through the handle: an overflowed
    /// queue closes the connection, a close request starts `Closing`.
    pub fn sync_with_handle(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        if self.handle.has_overflowed() {
            warn!("⚠️ Connection {} output queue overflowed", self.id());
            self.close(DisconnectReason::OutputOverflow);
        } else if self.handle.is_close_requested() {
            self.begin_closing();
        }
    }

    /// Stops accepting output and closes as soon as the queue is flushed.
    pub fn begin_closing(&mut self) {
        match self.state {
            ConnectionState::Negotiating | ConnectionState::Active => {
                self.handle.stop_accepting();
                self.state = ConnectionState::Closing;
                debug!("Connection {} closing after flush", self.id());
                self.finish_closing();
            }
            ConnectionState::Closing | ConnectionState::Closed => {}
        }
    }

    /// Closes immediately, discarding any queued output.
    pub fn close(&mut self, reason: DisconnectReason) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.handle.stop_accepting();
        self.state = ConnectionState::Closed;
        self.in_flight = None;
        info!(
            "🔌 Connection {} ({}) closed: {}",
            self.id(),
            self.handle.remote_addr(),
            reason
        );
        self.close_reason = Some(reason);
    }

    fn finish_closing(&mut self) {
        if self.state == ConnectionState::Closing && !self.has_pending_output() {
            self.close(DisconnectReason::Requested);
        }
    }

    fn fail(&mut self, error: &ConnectionError) {
        warn!("⚠️ Connection {} failed: {}", self.id(), error);
        let reason = match error {
            ConnectionError::InputOverflow { .. } => DisconnectReason::InputOverflow,
            ConnectionError::OutputOverflow { .. } => DisconnectReason::OutputOverflow,
            ConnectionError::Io(e) => DisconnectReason::Error(e.to_string()),
        };
        self.close(reason);
    }

    fn consume(&mut self, bytes: &[u8]) -> Result<usize, ConnectionError> {
        let held;
        let data: &[u8] = if self.partial_command.is_empty() {
            bytes
        } else {
            let mut joined = std::mem::take(&mut self.partial_command);
            joined.extend_from_slice(bytes);
            held = joined;
            &held
        };

        let mut completed = 0;
        let mut pos = 0;
        while pos < data.len() {
            let byte = data[pos];

            if byte == IAC {
                match telnet::parse_command(&data[pos..]) {
                    Ok(command) => {
                        pos += command.wire_len();
                        self.handle_command(command)?;
                    }
                    Err(FramingError::Incomplete { needed, available }) => {
                        trace!(
                            "Holding partial telnet command ({}/{} bytes) for connection {}",
                            available,
                            needed,
                            self.id()
                        );
                        self.partial_command = data[pos..].to_vec();
                        break;
                    }
                    Err(FramingError::NotACommand(_)) => {
                        pos += 1;
                        self.after_cr = false;
                        self.push_data(byte)?;
                    }
                }
                continue;
            }

            pos += 1;
            match byte {
                CR => {
                    self.complete_line();
                    completed += 1;
                    self.after_cr = true;
                    continue;
                }
                LF | NUL if self.after_cr => {}
                LF => {
                    self.complete_line();
                    completed += 1;
                }
                NUL => {}
                BS | DEL => {
                    self.accumulator.pop();
                }
                _ => self.push_data(byte)?,
            }
            self.after_cr = false;
        }

        Ok(completed)
    }

    fn handle_command(&mut self, command: Command) -> Result<(), ConnectionError> {
        // Commands sit outside the data stream; only an escaped IAC is data.
        if command == Command::Escaped {
            self.after_cr = false;
            return self.push_data(IAC);
        }
        if let Some(reply) = command.reply() {
            debug!("Refusing telnet {:?} from connection {}", command, self.id());
            self.handle.enqueue(Outgoing::Raw(reply))?;
        }
        Ok(())
    }

    fn push_data(&mut self, byte: u8) -> Result<(), ConnectionError> {
        if self.accumulator.len() >= self.max_line_length {
            return Err(ConnectionError::InputOverflow {
                limit: self.max_line_length,
            });
        }
        self.accumulator.push(byte);
        Ok(())
    }

    fn complete_line(&mut self) {
        let line = String::from_utf8_lossy(&self.accumulator).into_owned();
        self.accumulator.clear();
        if self.state != ConnectionState::Active {
            trace!("Discarding line from {} connection {}", self.state, self.id());
            return;
        }
        debug!("📨 From {}: {}", self.id(), line);
        self.incoming.push_back(line);
    }

    fn encode(&self, unit: Outgoing) -> InFlight {
        let bytes = match unit {
            Outgoing::Raw(bytes) => bytes,
            Outgoing::Line(text) => {
                debug!("📤 To {}: {}", self.id(), text);
                let mut bytes = Vec::with_capacity(text.len() + 2);
                self.framing.frame_line(&text, &self.accumulator, &mut bytes);
                bytes
            }
        };
        InFlight { bytes, written: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{PlainFraming, RedrawFraming};
    use crate::protocol::telnet::{DO, DONT, ECHO, WILL, WONT};
    use std::io::Cursor;

    /// In-memory stream: reads come from `input`, writes land in `output`
    /// unless `write_limit` caps how much a single write accepts.
    #[derive(Default)]
    struct MockStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
        write_limit: Option<usize>,
        would_block_on_empty: bool,
        fail_writes: bool,
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.input.read(buf)?;
            if n == 0 && self.would_block_on_empty {
                return Err(io::Error::from(io::ErrorKind::WouldBlock));
            }
            Ok(n)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            match self.write_limit {
                Some(0) => Err(io::Error::from(io::ErrorKind::WouldBlock)),
                Some(limit) => {
                    let n = limit.min(buf.len());
                    self.output.extend_from_slice(&buf[..n]);
                    Ok(n)
                }
                None => {
                    self.output.extend_from_slice(buf);
                    Ok(buf.len())
                }
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn connection_with(stream: MockStream) -> Connection<MockStream, PlainFraming> {
        let handle = Arc::new(ConnectionHandle::new(
            1,
            "127.0.0.1:4000".parse().unwrap(),
            64,
            None,
        ));
        let mut connection = Connection::new(handle, stream, PlainFraming, 32);
        connection.open(false).unwrap();
        connection
    }

    fn connection() -> Connection<MockStream, PlainFraming> {
        connection_with(MockStream::default())
    }

    fn flush_all<S: Read + Write, F: LineFraming>(connection: &mut Connection<S, F>) {
        while let Ok(WriteProgress::Flushed { .. }) = connection.drain_writable() {}
    }

    #[test]
    fn test_open_queues_negotiation_in_order() {
        let handle = Arc::new(ConnectionHandle::new(
            1,
            "127.0.0.1:4000".parse().unwrap(),
            64,
            None,
        ));
        let mut connection = Connection::new(handle, MockStream::default(), PlainFraming, 32);
        assert_eq!(connection.state(), ConnectionState::Negotiating);

        connection.open(true).unwrap();
        assert_eq!(connection.state(), ConnectionState::Active);
        flush_all(&mut connection);
        assert_eq!(
            connection.stream().output,
            vec![255, 254, 1, 255, 251, 1, 255, 253, 3, 255, 251, 3]
        );
    }

    #[test]
    fn test_lines_reassemble_across_reads() {
        let mut connection = connection();
        assert_eq!(connection.drain_readable(b"go").unwrap(), 0);
        assert_eq!(connection.drain_readable(b"ss").unwrap(), 0);
        assert_eq!(connection.drain_readable(b"ip hi\r").unwrap(), 1);

        let lines: Vec<String> = connection.take_lines().collect();
        assert_eq!(lines, vec!["gossip hi"]);
    }

    #[test]
    fn test_chunking_does_not_change_lines() {
        let input: &[u8] = b"look\r\nsay hi\rnorth\n\r\n\xff\xfd\x18west\r\0";
        let mut whole = connection();
        whole.drain_readable(input).unwrap();
        let expected: Vec<String> = whole.take_lines().collect();
        assert_eq!(expected, vec!["look", "say hi", "north", "", "west"]);

        for split in 1..input.len() {
            let mut chunked = connection();
            for chunk in input.chunks(split) {
                chunked.drain_readable(chunk).unwrap();
            }
            let lines: Vec<String> = chunked.take_lines().collect();
            assert_eq!(lines, expected, "chunk size {split}");
        }
    }

    #[test]
    fn test_crlf_and_cr_nul_are_single_terminators() {
        let mut connection = connection();
        connection.drain_readable(b"a\r\nb\r\0c\n").unwrap();
        let lines: Vec<String> = connection.take_lines().collect();
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_command_between_cr_and_lf_keeps_single_terminator() {
        let mut whole = connection();
        whole
            .drain_readable(&[b'a', CR, IAC, telnet::NOP, LF, b'b', CR])
            .unwrap();
        let lines: Vec<String> = whole.take_lines().collect();
        assert_eq!(lines, vec!["a", "b"]);

        let mut split = connection();
        split.drain_readable(&[b'a', CR, IAC]).unwrap();
        split.drain_readable(&[telnet::NOP]).unwrap();
        split.drain_readable(&[LF, b'b', CR]).unwrap();
        assert_eq!(split.take_lines().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_escaped_iac_after_cr_is_data() {
        let mut connection = connection();
        connection.drain_readable(&[b'a', CR, IAC, IAC, LF]).unwrap();
        let lines: Vec<String> = connection.take_lines().collect();
        assert_eq!(lines, vec!["a".to_string(), String::from_utf8_lossy(&[255]).into_owned()]);
    }

    #[test]
    fn test_backspace_and_delete_erase() {
        let mut connection = connection();
        connection.drain_readable(b"lookk\x08 x\x7f\x7f\r").unwrap();
        let lines: Vec<String> = connection.take_lines().collect();
        assert_eq!(lines, vec!["look"]);
    }

    #[test]
    fn test_split_option_request_is_answered_once() {
        let mut connection = connection();
        connection.drain_readable(&[b'h', IAC]).unwrap();
        connection.drain_readable(&[DO]).unwrap();
        assert_eq!(connection.handle().pending(), 0);
        connection.drain_readable(&[ECHO, b'i', CR]).unwrap();

        assert_eq!(connection.take_lines().collect::<Vec<_>>(), vec!["hi"]);
        flush_all(&mut connection);
        assert_eq!(connection.stream().output, vec![IAC, WONT, ECHO]);
    }

    #[test]
    fn test_declines_and_escaped_iac() {
        let mut connection = connection();
        connection
            .drain_readable(&[IAC, WONT, ECHO, IAC, DONT, ECHO, b'a', IAC, IAC, b'b', CR])
            .unwrap();

        assert_eq!(connection.handle().pending(), 0);
        let lines: Vec<String> = connection.take_lines().collect();
        assert_eq!(lines, vec![String::from_utf8_lossy(&[b'a', 255, b'b']).into_owned()]);
    }

    #[test]
    fn test_control_command_acknowledged_with_crlf() {
        let mut connection = connection();
        connection.drain_readable(&[IAC, telnet::AYT]).unwrap();
        connection.drain_readable(&[IAC, WILL, 24]).unwrap();
        flush_all(&mut connection);
        assert_eq!(connection.stream().output, vec![CR, LF, IAC, DONT, 24]);
    }

    #[test]
    fn test_input_overflow_closes() {
        let mut connection = connection();
        let long = vec![b'x'; 33];
        assert!(matches!(
            connection.drain_readable(&long),
            Err(ConnectionError::InputOverflow { limit: 32 })
        ));
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(connection.close_reason(), Some(&DisconnectReason::InputOverflow));
    }

    #[test]
    fn test_empty_queue_write_is_noop() {
        let mut connection = connection();
        assert_eq!(connection.drain_writable().unwrap(), WriteProgress::Idle);
        assert_eq!(connection.drain_writable().unwrap(), WriteProgress::Idle);
        assert!(connection.stream().output.is_empty());
        assert_eq!(connection.state(), ConnectionState::Active);
    }

    #[test]
    fn test_one_unit_per_drain() {
        let mut connection = connection();
        connection.handle().send_line("first").unwrap();
        connection.handle().send_line("second").unwrap();

        assert_eq!(
            connection.drain_writable().unwrap(),
            WriteProgress::Flushed { remaining: 1 }
        );
        assert_eq!(connection.stream().output, b"first\r\n".to_vec());
        assert_eq!(
            connection.drain_writable().unwrap(),
            WriteProgress::Flushed { remaining: 0 }
        );
        assert_eq!(connection.stream().output, b"first\r\nsecond\r\n".to_vec());
    }

    #[test]
    fn test_partial_write_resumes() {
        let mut connection = connection_with(MockStream {
            write_limit: Some(0),
            ..Default::default()
        });
        connection.handle().send_line("hello").unwrap();

        assert_eq!(connection.drain_writable().unwrap(), WriteProgress::Blocked);
        assert!(connection.has_pending_output());

        connection.stream_mut().write_limit = Some(3);
        // Each call keeps writing until the socket blocks or the unit is done.
        assert_eq!(
            connection.drain_writable().unwrap(),
            WriteProgress::Flushed { remaining: 0 }
        );
        assert_eq!(connection.stream().output, b"hello\r\n".to_vec());
        assert!(!connection.has_pending_output());
    }

    #[test]
    fn test_write_error_closes() {
        let mut connection = connection_with(MockStream {
            fail_writes: true,
            ..Default::default()
        });
        connection.handle().send_line("hello").unwrap();

        assert!(connection.drain_writable().is_err());
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(matches!(connection.close_reason(), Some(DisconnectReason::Error(_))));
        assert!(!connection.handle().send_line("ignored").unwrap());
    }

    #[test]
    fn test_read_until_eof_closes() {
        let mut connection = connection_with(MockStream {
            input: Cursor::new(b"look\r\n".to_vec()),
            ..Default::default()
        });
        let mut buffer = [0u8; 4];

        assert_eq!(connection.read_from_stream(&mut buffer, 16), ReadProgress::Closed);
        assert_eq!(connection.take_lines().collect::<Vec<_>>(), vec!["look"]);
        assert_eq!(connection.close_reason(), Some(&DisconnectReason::ClientDisconnect));
    }

    #[test]
    fn test_read_budget_and_would_block() {
        let mut connection = connection_with(MockStream {
            input: Cursor::new(b"abcdefgh\r".to_vec()),
            would_block_on_empty: true,
            ..Default::default()
        });
        let mut buffer = [0u8; 2];

        assert_eq!(connection.read_from_stream(&mut buffer, 2), ReadProgress::BudgetExhausted);
        assert_eq!(connection.take_lines().count(), 0);
        assert_eq!(connection.read_from_stream(&mut buffer, 16), ReadProgress::Drained);
        assert_eq!(connection.take_lines().collect::<Vec<_>>(), vec!["abcdefgh"]);
        assert_eq!(connection.state(), ConnectionState::Active);
    }

    #[test]
    fn test_closing_flushes_then_closes() {
        let mut connection = connection();
        connection.handle().send_line("Goodbye.").unwrap();
        connection.handle().request_close();
        connection.sync_with_handle();

        assert_eq!(connection.state(), ConnectionState::Closing);
        assert!(!connection.handle().send_line("late").unwrap());
        flush_all(&mut connection);

        assert_eq!(connection.stream().output, b"Goodbye.\r\n".to_vec());
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(connection.close_reason(), Some(&DisconnectReason::Requested));
    }

    #[test]
    fn test_close_request_with_empty_queue_closes_immediately() {
        let mut connection = connection();
        connection.handle().request_close();
        connection.sync_with_handle();
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_output_overflow_detected_on_sync() {
        let handle = Arc::new(ConnectionHandle::new(
            5,
            "127.0.0.1:4000".parse().unwrap(),
            1,
            None,
        ));
        let mut connection = Connection::new(handle, MockStream::default(), PlainFraming, 32);
        connection.open(false).unwrap();

        connection.handle().send_line("one").unwrap();
        assert!(connection.handle().send_line("two").is_err());
        connection.sync_with_handle();
        assert_eq!(connection.close_reason(), Some(&DisconnectReason::OutputOverflow));
    }

    #[test]
    fn test_redraw_framing_repaints_pending_input() {
        let handle = Arc::new(ConnectionHandle::new(
            1,
            "127.0.0.1:4000".parse().unwrap(),
            64,
            None,
        ));
        let mut connection =
            Connection::new(handle, MockStream::default(), RedrawFraming::new("> "), 32);
        connection.open(false).unwrap();

        connection.drain_readable(b"loo").unwrap();
        connection.handle().send_line("2 gossips: hey").unwrap();
        flush_all(&mut connection);
        assert_eq!(
            connection.stream().output,
            b"\r\x1b[2K2 gossips: hey\r\n> loo".to_vec()
        );
    }

    #[test]
    fn test_redraw_framing_escapes_typed_iac() {
        let handle = Arc::new(ConnectionHandle::new(
            1,
            "127.0.0.1:4000".parse().unwrap(),
            64,
            None,
        ));
        let mut connection =
            Connection::new(handle, MockStream::default(), RedrawFraming::new("> "), 32);
        connection.open(false).unwrap();

        connection.drain_readable(&[b'a', IAC, IAC]).unwrap();
        connection.handle().send_line("hi").unwrap();
        flush_all(&mut connection);
        assert_eq!(
            connection.stream().output,
            b"\r\x1b[2Khi\r\n> a\xff\xff".to_vec()
        );
    }
}
