//! The multiplexer: one thread owning every client socket.
//!
//! Each turn runs the same steps in order:
//!
//! 1. sweep connections that reached `Closed`
//! 2. take newly accepted sockets off the pending queue
//! 3. poll for readiness (zero timeout while carry-over work exists)
//! 4. apply notifications from the dispatch thread
//! 5. read from readable connections and publish completed lines
//! 6. write one output unit to each writable connection
//!
//! mio is edge-triggered, so a connection cut off by the per-turn budget is
//! kept in a carry-over set and served again next turn without waiting for a
//! fresh readiness event.

use super::listener::AcceptedSocket;
use crate::config::ServerConfig;
use crate::connection::{
    Connection, ConnectionHandle, ConnectionRegistry, ConnectionState, Framing, ReadProgress,
    WriteNotifier, WriteProgress,
};
use crossbeam::channel::Receiver;
use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token};
use mud_event_system::{
    current_timestamp, ConnectionId, DisconnectReason, Event, EventRouter, ShutdownState,
};
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Token of the waker shared by the listener and the connection handles.
pub(crate) const WAKER: Token = Token(0);

const SERVER_FULL: &[u8] = b"Server is full.\r\n";

type TelnetConnection = Connection<TcpStream, Framing>;

pub(crate) struct Reactor {
    poll: Poll,
    config: ServerConfig,
    framing: Framing,
    registry: Arc<ConnectionRegistry>,
    router: Arc<EventRouter>,
    accepted: Receiver<AcceptedSocket>,
    notifications: Receiver<ConnectionId>,
    notifier: WriteNotifier,
    shutdown: ShutdownState,
    connections: HashMap<ConnectionId, TelnetConnection>,
    /// Known readable but not yet drained to `WouldBlock`
    readable: HashSet<ConnectionId>,
    /// Known writable with output waiting
    writable: HashSet<ConnectionId>,
    /// Connections currently registered for write readiness
    write_interest: HashSet<ConnectionId>,
    /// Closed this turn, finalized by the next sweep
    closed: Vec<ConnectionId>,
    read_buffer: Vec<u8>,
}

impl Reactor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        poll: Poll,
        config: ServerConfig,
        registry: Arc<ConnectionRegistry>,
        router: Arc<EventRouter>,
        accepted: Receiver<AcceptedSocket>,
        notifications: Receiver<ConnectionId>,
        notifier: WriteNotifier,
        shutdown: ShutdownState,
    ) -> Self {
        let framing = Framing::from_mode(config.framing, &config.prompt);
        let read_buffer = vec![0; config.read_buffer_size.max(1)];
        Self {
            poll,
            config,
            framing,
            registry,
            router,
            accepted,
            notifications,
            notifier,
            shutdown,
            connections: HashMap::new(),
            readable: HashSet::new(),
            writable: HashSet::new(),
            write_interest: HashSet::new(),
            closed: Vec::new(),
            read_buffer,
        }
    }

    /// Runs turns until shutdown, then closes every remaining connection.
    pub(crate) fn run(mut self) {
        let mut events = Events::with_capacity(1024);
        info!("⚙️ Reactor running");

        while !self.shutdown.is_shutdown_initiated() {
            if let Err(e) = self.turn(&mut events) {
                error!("❌ Reactor poll failed: {}", e);
                break;
            }
        }

        self.close_all();
        info!("🛑 Reactor stopped");
    }

    fn turn(&mut self, events: &mut Events) -> io::Result<()> {
        self.sweep();
        self.absorb_accepted();

        let timeout = if self.readable.is_empty() && self.writable.is_empty() {
            Duration::from_millis(self.config.poll_timeout_ms)
        } else {
            Duration::ZERO
        };

        match self.poll.poll(events, Some(timeout)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e),
        }

        for event in events.iter() {
            if event.token() == WAKER {
                continue;
            }
            let id = event.token().0 as ConnectionId;
            if event.is_readable() || event.is_read_closed() || event.is_error() {
                self.readable.insert(id);
            }
            if event.is_writable() {
                self.writable.insert(id);
            }
        }
        trace!(
            "Turn: {} readable, {} writable",
            self.readable.len(),
            self.writable.len()
        );

        self.absorb_notifications();
        self.read_ready();
        self.write_ready();
        Ok(())
    }

    /// Step 1: removes closed connections and publishes their close events.
    fn sweep(&mut self) {
        for id in std::mem::take(&mut self.closed) {
            let Some(mut connection) = self.connections.remove(&id) else {
                continue;
            };

            if let Err(e) = self.poll.registry().deregister(connection.stream_mut()) {
                trace!("Deregister of connection {} failed: {}", id, e);
            }
            self.registry.remove(id);
            self.readable.remove(&id);
            self.writable.remove(&id);
            self.write_interest.remove(&id);

            let reason = connection
                .close_reason()
                .cloned()
                .unwrap_or(DisconnectReason::ClientDisconnect);
            self.publish(Event::ConnectionClosed {
                id,
                reason,
                timestamp: current_timestamp(),
            });
        }
    }

    /// Step 2: takes ownership of sockets the listener accepted.
    fn absorb_accepted(&mut self) {
        while let Ok(socket) = self.accepted.try_recv() {
            self.admit(socket);
        }
    }

    fn admit(&mut self, socket: AcceptedSocket) {
        let AcceptedSocket {
            id,
            mut stream,
            remote_addr,
        } = socket;

        let open = self.open_connections();
        if open >= self.config.max_connections {
            warn!("🚫 Rejecting {} - server full ({} connections)", remote_addr, open);
            if let Err(e) = stream.write_all(SERVER_FULL) {
                trace!("Could not tell {} the server is full: {}", remote_addr, e);
            }
            return;
        }

        if let Err(e) = stream.set_nodelay(true) {
            trace!("TCP_NODELAY unavailable for {}: {}", remote_addr, e);
        }
        if let Err(e) = self
            .poll
            .registry()
            .register(&mut stream, Token(id as usize), Interest::READABLE)
        {
            warn!("⚠️ Failed to register connection {}: {}", id, e);
            return;
        }

        let handle = Arc::new(ConnectionHandle::new(
            id,
            remote_addr,
            self.config.max_outgoing_queue,
            Some(self.notifier.clone()),
        ));
        let mut connection = Connection::new(
            Arc::clone(&handle),
            stream,
            self.framing.clone(),
            self.config.max_line_length,
        );

        if let Err(e) = connection.open(self.config.negotiate_on_connect) {
            warn!("⚠️ Connection {} failed during negotiation: {}", id, e);
            let _ = self.poll.registry().deregister(connection.stream_mut());
            return;
        }

        self.registry.insert(handle);
        self.connections.insert(id, connection);
        // Data may have arrived before registration.
        self.readable.insert(id);
        self.writable.insert(id);

        info!("🔗 Connection {} opened from {}", id, remote_addr);
        self.publish(Event::ConnectionOpened {
            id,
            remote_addr,
            timestamp: current_timestamp(),
        });
    }

    /// Connections that still count against `max_connections`; closed ones
    /// waiting for the sweep do not.
    fn open_connections(&self) -> usize {
        self.connections
            .values()
            .filter(|connection| connection.state() != ConnectionState::Closed)
            .count()
    }

        /// Step 4: applies queue and close changes made by other threads.
    fn absorb_notifications(&mut self) {
        let ids: HashSet<ConnectionId> = self.notifications.try_iter().collect();
        for id in ids {
            let Some(connection) = self.connections.get_mut(&id) else {
                continue;
            };
            connection.sync_with_handle();
            if connection.state() == ConnectionState::Closed {
                self.closed.push(id);
            } else if connection.has_pending_output() {
                self.writable.insert(id);
            }
        }
    }

    /// Step 5: reads up to the budget from each readable connection.
    fn read_ready(&mut self) {
        let ready: Vec<ConnectionId> = self.readable.drain().collect();
        for id in ready {
            let Some(connection) = self.connections.get_mut(&id) else {
                continue;
            };

            let progress = connection.read_from_stream(&mut self.read_buffer, self.config.read_budget);
            for text in connection.take_lines() {
                if let Err(e) = self.router.publish(Event::IncomingMessage { id, text }) {
                    debug!("Dropping input from connection {}: {}", id, e);
                }
            }

            match progress {
                ReadProgress::Drained => {}
                ReadProgress::BudgetExhausted => {
                    self.readable.insert(id);
                }
                ReadProgress::Closed => {
                    self.closed.push(id);
                    continue;
                }
            }

            // Telnet replies queued while reading.
            if connection.has_pending_output() {
                self.writable.insert(id);
            }
        }
    }

    /// Step 6: writes one unit per writable connection.
    fn write_ready(&mut self) {
        let ready: Vec<ConnectionId> = self.writable.drain().collect();
        for id in ready {
            let Some(connection) = self.connections.get_mut(&id) else {
                continue;
            };

            let progress = connection.drain_writable();
            if connection.state() == ConnectionState::Closed {
                self.closed.push(id);
                continue;
            }

            let wants_write = match progress {
                Ok(WriteProgress::Blocked) => true,
                Ok(WriteProgress::Flushed { .. }) => {
                    if connection.has_pending_output() {
                        self.writable.insert(id);
                    }
                    false
                }
                Ok(WriteProgress::Idle) => false,
                Err(_) => {
                    self.closed.push(id);
                    continue;
                }
            };

            let registered = self.write_interest.contains(&id);
            if wants_write == registered {
                continue;
            }

            let interest = if wants_write {
                Interest::READABLE | Interest::WRITABLE
            } else {
                Interest::READABLE
            };
            match self
                .poll
                .registry()
                .reregister(connection.stream_mut(), Token(id as usize), interest)
            {
                Ok(()) => {
                    if wants_write {
                        trace!("Connection {} waiting for write readiness", id);
                        self.write_interest.insert(id);
                    } else {
                        self.write_interest.remove(&id);
                    }
                }
                Err(e) => {
                    warn!("⚠️ Failed to update interest for connection {}: {}", id, e);
                    connection.close(DisconnectReason::Error(e.to_string()));
                    self.closed.push(id);
                }
            }
        }
    }

    /// Flushes what each connection can take without blocking, then closes
    /// everything with `ServerShutdown`.
    fn close_all(&mut self) {
        info!("🧹 Closing {} connections", self.connections.len());
        for (id, connection) in self.connections.iter_mut() {
            while let Ok(WriteProgress::Flushed { .. }) = connection.drain_writable() {}
            connection.close(DisconnectReason::ServerShutdown);
            self.closed.push(*id);
        }
        self.sweep();
    }

    fn publish(&self, event: Event) {
        if let Err(e) = self.router.publish(event) {
            debug!("Event not published: {}", e);
        }
    }
}
