//! Accept loop feeding the reactor's pending queue.

use crossbeam::channel::Sender;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};
use mud_event_system::{ConnectionId, ShutdownState};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const LISTENER: Token = Token(0);

/// How often the accept loop re-checks the shutdown flag while idle.
const ACCEPT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// A socket accepted but not yet owned by the reactor.
#[derive(Debug)]
pub(crate) struct AcceptedSocket {
    pub(crate) id: ConnectionId,
    pub(crate) stream: TcpStream,
    pub(crate) remote_addr: SocketAddr,
}

pub(crate) struct Listener {
    listener: TcpListener,
    poll: Poll,
    accepted: Sender<AcceptedSocket>,
    reactor_waker: Arc<Waker>,
    shutdown: ShutdownState,
    next_id: ConnectionId,
}

impl Listener {
    pub(crate) fn new(
        mut listener: TcpListener,
        accepted: Sender<AcceptedSocket>,
        reactor_waker: Arc<Waker>,
        shutdown: ShutdownState,
    ) -> io::Result<Self> {
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        Ok(Self {
            listener,
            poll,
            accepted,
            reactor_waker,
            shutdown,
            next_id: 1,
        })
    }

    /// Accepts until shutdown is initiated.
    pub(crate) fn run(mut self) {
        let mut events = Events::with_capacity(64);
        info!("👂 Listener accepting connections");

        while !self.shutdown.is_shutdown_initiated() {
            if let Err(e) = self.poll.poll(&mut events, Some(ACCEPT_POLL_TIMEOUT)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!("❌ Listener poll failed: {}", e);
                break;
            }

            if events.iter().any(|event| event.token() == LISTENER) {
                self.accept_pending();
            }
        }

        info!("🛑 Listener stopped");
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, remote_addr)) => {
                    let id = self.next_id;
                    self.next_id += 1;
                    debug!("🔗 Accepted {} as connection {}", remote_addr, id);

                    let socket = AcceptedSocket {
                        id,
                        stream,
                        remote_addr,
                    };
                    if self.accepted.send(socket).is_err() {
                        warn!("⚠️ Reactor is gone, dropping connection {}", id);
                        return;
                    }
                    if let Err(e) = self.reactor_waker.wake() {
                        warn!("⚠️ Failed to wake reactor: {}", e);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Resource exhaustion and the like; the next readiness event retries.
                    warn!("⚠️ Failed to accept connection: {}", e);
                    return;
                }
            }
        }
    }
}
