//! Core telnet server implementation.
//!
//! This module contains the `TelnetServer` struct, which binds the listening
//! socket, starts the listener and reactor threads, and wires the outbound
//! handlers into the event router.

use super::handlers::register_outbound_handlers;
use super::listener::Listener;
use super::reactor::{Reactor, WAKER};
use crate::config::ServerConfig;
use crate::connection::{ConnectionRegistry, WriteNotifier};
use crate::error::ServerError;
use crossbeam::channel;
use mio::{Poll, Waker};
use mud_event_system::{EventRouter, ShutdownState};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

/// The telnet server.
///
/// `TelnetServer` owns the connection registry and the network threads. It
/// contains no command or game logic; everything a client says is published
/// as an event and everything sent to a client arrives as one.
///
/// # Threads
///
/// * **telnet-listener** accepts sockets and hands them to the reactor
/// * **telnet-reactor** owns every client socket and performs all I/O
///
/// Event delivery happens on the router's own dispatch thread, which the
/// caller starts and stops.
pub struct TelnetServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Router shared with command handlers and plugins
    event_router: Arc<EventRouter>,

    /// Live connections, written only by the reactor
    registry: Arc<ConnectionRegistry>,

    /// Shared shutdown flags for the network threads
    shutdown_state: ShutdownState,

    local_addr: Mutex<Option<SocketAddr>>,
    reactor_waker: Mutex<Option<Arc<Waker>>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl TelnetServer {
    /// Creates a server that will publish to and take output from `event_router`.
    pub fn new(config: ServerConfig, event_router: Arc<EventRouter>) -> Self {
        Self::with_shutdown_state(config, event_router, ShutdownState::new())
    }

    /// Creates a server that stops when `shutdown_state` is initiated.
    pub fn with_shutdown_state(
        config: ServerConfig,
        event_router: Arc<EventRouter>,
        shutdown_state: ShutdownState,
    ) -> Self {
        Self {
            config,
            event_router,
            registry: Arc::new(ConnectionRegistry::new()),
            shutdown_state,
            local_addr: Mutex::new(None),
            reactor_waker: Mutex::new(None),
            threads: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Binds the listening socket and starts the network threads.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 was requested. A bind failure is returned as
    /// [`ServerError::Network`] and nothing is started. A server that has been
    /// shut down stays down.
    pub fn start(&self) -> Result<SocketAddr, ServerError> {
        if self.shutdown_state.is_shutdown_initiated() {
            return Err(ServerError::Internal("server is shutting down".to_string()));
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(ServerError::Internal("server already started".to_string()));
        }

        let result = self.launch();
        if result.is_err() {
            self.started.store(false, Ordering::Release);
        }
        result
    }

    fn launch(&self) -> Result<SocketAddr, ServerError> {
        info!("🚀 Starting telnet server on {}", self.config.bind_address);

        let std_listener = std::net::TcpListener::bind(self.config.bind_address).map_err(|e| {
            ServerError::Network(format!("Failed to bind {}: {e}", self.config.bind_address))
        })?;
        std_listener
            .set_nonblocking(true)
            .map_err(|e| ServerError::Network(format!("Failed to set non-blocking mode: {e}")))?;
        let local_addr = std_listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Failed to read local address: {e}")))?;
        let listener = mio::net::TcpListener::from_std(std_listener);

        let poll = Poll::new()
            .map_err(|e| ServerError::Internal(format!("Failed to create poll: {e}")))?;
        let waker = Arc::new(
            Waker::new(poll.registry(), WAKER)
                .map_err(|e| ServerError::Internal(format!("Failed to create waker: {e}")))?,
        );

        let (accept_tx, accept_rx) = channel::unbounded();
        let (notify_tx, notify_rx) = channel::unbounded();

        let listener = Listener::new(
            listener,
            accept_tx,
            Arc::clone(&waker),
            self.shutdown_state.clone(),
        )
        .map_err(|e| ServerError::Network(format!("Failed to register listener: {e}")))?;

        let reactor = Reactor::new(
            poll,
            self.config.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.event_router),
            accept_rx,
            notify_rx,
            WriteNotifier::new(notify_tx, Arc::clone(&waker)),
            self.shutdown_state.clone(),
        );

        let reactor_thread = thread::Builder::new()
            .name("telnet-reactor".to_string())
            .spawn(move || reactor.run())
            .map_err(|e| ServerError::Internal(format!("Failed to spawn reactor: {e}")))?;
        let listener_thread = match thread::Builder::new()
            .name("telnet-listener".to_string())
            .spawn(move || listener.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                error!("❌ Failed to spawn listener, stopping reactor: {}", e);
                self.shutdown_state.initiate_shutdown();
                if let Err(e) = waker.wake() {
                    warn!("⚠️ Failed to wake reactor for shutdown: {}", e);
                }
                if reactor_thread.join().is_err() {
                    warn!("⚠️ Thread telnet-reactor terminated abnormally");
                }
                return Err(ServerError::Internal(format!("Failed to spawn listener: {e}")));
            }
        };

        // Only a fully running server delivers output.
        register_outbound_handlers(
            &self.event_router,
            Arc::clone(&self.registry),
            self.config.gossip.clone(),
        );

        self.threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([reactor_thread, listener_thread]);
        *self.reactor_waker.lock().unwrap_or_else(PoisonError::into_inner) = Some(waker);
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(local_addr);

        info!("✅ Telnet server listening on {}", local_addr);
        Ok(local_addr)
    }

    /// Stops accepting, closes every connection with `ServerShutdown`, and
    /// waits for the network threads to exit.
    ///
    /// Close events are published before this returns; stop the router
    /// afterwards so they are delivered.
    pub fn shutdown(&self) {
        self.shutdown_state.initiate_shutdown();

        if let Some(waker) = self
            .reactor_waker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            if let Err(e) = waker.wake() {
                warn!("⚠️ Failed to wake reactor for shutdown: {}", e);
            }
        }

        let threads: Vec<_> = self
            .threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in threads {
            let name = handle.thread().name().unwrap_or("unnamed").to_string();
            if handle.join().is_err() {
                warn!("⚠️ Thread {} terminated abnormally", name);
            }
        }
        info!("🧹 Telnet server stopped");
    }

    /// The bound address, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Live connections.
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Gets a reference to the event router.
    pub fn get_event_router(&self) -> Arc<EventRouter> {
        Arc::clone(&self.event_router)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl Drop for TelnetServer {
    fn drop(&mut self) {
        let running = !self
            .threads
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty();
        if running {
            self.shutdown();
        }
    }
}
