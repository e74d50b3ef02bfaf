//! # Connection Multiplexer
//!
//! One listening socket, a fixed table of connection slots, one readiness
//! poller, no threads.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       poll()                             │
//! ├──────────────────────────────────────────────────────────┤
//! │  1. accept   -> free slot or abort (RST)                 │
//! │  2. readiness query (zero timeout)                       │
//! │  3. read     -> len:u16 | body  -> handler.on_read       │
//! │  4. write    -> handler.produce_output, drain to socket  │
//! │  5. status   -> Closing latched, close when drained      │
//! │     idle     -> abort                                    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Per-connection failures never leave `poll`; they abort the connection and
//! run the handler's drop hook.

mod connection;
mod handler;
mod tick;

pub use connection::{ConnectionSlot, ReadEvent, ReadState, WriteEvent, LENGTH_PREFIX_LEN};
pub use handler::{ConnectionHandler, ConnectionId, ConnectionStatus};
pub use tick::{TickLoop, TickStats};

use std::io;
use std::net::{Shutdown, SocketAddr};
use std::time::{Duration, Instant};

use ashgate_core::{Arena, SlotPool};
use ashgate_shared::{GameConfig, LoginConfig};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Protocol, SockRef, Socket, Type};

use crate::error::{NetworkError, NetworkResult};

/// Pending connections the kernel may queue before `accept`.
const LISTEN_BACKLOG: i32 = 128;

/// Multiplexer settings.
#[derive(Clone, Debug)]
pub struct MultiplexerSettings {
    /// Service name used in log fields.
    pub service: &'static str,
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Number of connection slots.
    pub capacity: usize,
    /// Largest message body a connection may send.
    pub read_buffer_size: usize,
    /// A connection moving no bytes for this long is aborted.
    pub idle_timeout: Duration,
}

impl MultiplexerSettings {
    /// Settings for the login service.
    #[must_use]
    pub fn login(config: &LoginConfig) -> Self {
        Self {
            service: "login",
            bind: config.bind,
            capacity: config.max_connections,
            read_buffer_size: config.read_buffer_size,
            idle_timeout: config.idle_timeout(),
        }
    }

    /// Settings for the game service.
    #[must_use]
    pub fn game(config: &GameConfig) -> Self {
        Self {
            service: "game",
            bind: config.bind,
            capacity: config.max_connections,
            read_buffer_size: config.read_buffer_size,
            idle_timeout: config.idle_timeout(),
        }
    }
}

/// Multiplexer counters, since bind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MultiplexerStats {
    /// Connections bound to a slot.
    pub accepted: u64,
    /// Connections refused because every slot was taken.
    pub rejected: u64,
    /// Connections closed gracefully.
    pub closed: u64,
    /// Connections reset after an error or framing violation.
    pub aborted: u64,
    /// Connections reset for inactivity.
    pub timed_out: u64,
    /// Messages delivered to the handler.
    pub messages_read: u64,
    /// Bytes read from sockets.
    pub bytes_read: u64,
    /// Bytes written to sockets.
    pub bytes_written: u64,
}

/// How a connection ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Teardown {
    /// Flush then FIN.
    Close,
    /// Immediate RST.
    Abort,
    /// RST after the idle deadline.
    Timeout,
}

/// Readiness-driven TCP multiplexer over a fixed slot table.
///
/// Generic over the protocol: everything above framing is delegated to `H`.
pub struct Multiplexer<H: ConnectionHandler> {
    settings: MultiplexerSettings,
    listener: TcpListener,
    local_addr: SocketAddr,
    poll: Poll,
    events: Events,
    slots: Vec<ConnectionSlot>,
    pool: SlotPool,
    handler: H,
    stats: MultiplexerStats,
}

impl<H: ConnectionHandler> Multiplexer<H> {
    /// Binds the listener and preallocates every slot's read buffer.
    ///
    /// # Errors
    ///
    /// [`NetworkError::Bind`] if the address cannot be bound,
    /// [`NetworkError::Poll`] if the poller cannot be created.
    pub fn bind(settings: MultiplexerSettings, handler: H, arena: &Arena) -> NetworkResult<Self> {
        let listener = listen(settings.bind).map_err(|source| NetworkError::Bind {
            addr: settings.bind,
            source,
        })?;
        let local_addr = listener.local_addr()?;
        let poll = Poll::new().map_err(NetworkError::Poll)?;

        let slots = (0..settings.capacity)
            .map(|_| ConnectionSlot::new(arena.alloc(settings.read_buffer_size, 8)))
            .collect();

        tracing::info!(
            service = settings.service,
            addr = %local_addr,
            capacity = settings.capacity,
            "Listening"
        );

        Ok(Self {
            events: Events::with_capacity(settings.capacity.max(1)),
            pool: SlotPool::new(settings.capacity),
            settings,
            listener,
            local_addr,
            poll,
            slots,
            handler,
            stats: MultiplexerStats::default(),
        })
    }

    /// Returns the bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the slot count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Returns the number of bound slots.
    #[must_use]
    pub fn live_connections(&self) -> usize {
        self.pool.live_count()
    }

    /// Returns the counters.
    #[must_use]
    pub const fn stats(&self) -> &MultiplexerStats {
        &self.stats
    }

    /// Returns the protocol handler.
    #[must_use]
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// Returns the protocol handler mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Runs one accept, read, write and status pass without blocking.
    ///
    /// # Errors
    ///
    /// [`NetworkError::Poll`] if the readiness query itself fails.
    pub fn poll(&mut self) -> NetworkResult<()> {
        self.accept_connections();

        match self.poll.poll(&mut self.events, Some(Duration::ZERO)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => self.events.clear(),
            Err(e) => return Err(NetworkError::Poll(e)),
        }
        for event in &self.events {
            if let Some(slot) = self.slots.get_mut(event.token().0) {
                slot.mark_ready(
                    event.is_readable() || event.is_read_closed() || event.is_error(),
                    event.is_writable() || event.is_write_closed(),
                );
            }
        }

        let now = Instant::now();
        for index in 0..self.slots.len() {
            if !self.pool.is_live(index) {
                continue;
            }
            let id = ConnectionId::from(index);

            let teardown = self
                .resume_reading(id)
                .or_else(|| self.resume_writing(id))
                .or_else(|| self.check_status(id, now));

            if let Some(teardown) = teardown {
                self.teardown(id, teardown);
            }
        }
        Ok(())
    }

    fn accept_connections(&mut self) {
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(service = self.settings.service, error = %e, "Accept failed");
                    return;
                }
            };

            let Some(index) = self.pool.acquire() else {
                self.stats.rejected += 1;
                tracing::warn!(
                    service = self.settings.service,
                    peer = %peer,
                    capacity = self.pool.capacity(),
                    "Connection rejected, every slot is taken"
                );
                abort(&stream);
                continue;
            };
            let id = ConnectionId::from(index);

            let mut stream = stream;
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(connection = %id, error = %e, "TCP_NODELAY not set");
            }
            let registered = self.poll.registry().register(
                &mut stream,
                Token(index),
                Interest::READABLE | Interest::WRITABLE,
            );
            if let Err(e) = registered {
                tracing::warn!(service = self.settings.service, peer = %peer, error = %e, "Register failed");
                abort(&stream);
                self.pool.release(index);
                continue;
            }

            self.slots[index].bind(stream, peer);
            self.stats.accepted += 1;
            tracing::info!(service = self.settings.service, connection = %id, peer = %peer, "Accepted");
            self.handler.on_accept(id, peer);
        }
    }

    fn resume_reading(&mut self, id: ConnectionId) -> Option<Teardown> {
        let slot = &mut self.slots[id.index()];
        while slot.is_readable() && !slot.is_closing() {
            match slot.read_message(&mut self.stats.bytes_read) {
                ReadEvent::Message(len) => {
                    self.stats.messages_read += 1;
                    tracing::trace!(connection = %id, len, "Message");
                    self.handler.on_read(id, slot.message_mut(len));
                    slot.reset_read();
                }
                ReadEvent::WouldBlock => break,
                ReadEvent::PeerClosed => {
                    tracing::debug!(connection = %id, "Peer closed");
                    return Some(Teardown::Close);
                }
                ReadEvent::BadLength(len) => {
                    tracing::warn!(
                        connection = %id,
                        len,
                        max = self.settings.read_buffer_size,
                        "Bad message length"
                    );
                    return Some(Teardown::Abort);
                }
                ReadEvent::Failed(e) => {
                    tracing::debug!(connection = %id, error = %e, "Read failed");
                    return Some(Teardown::Abort);
                }
            }
        }
        None
    }

    fn resume_writing(&mut self, id: ConnectionId) -> Option<Teardown> {
        let slot = &mut self.slots[id.index()];
        if !slot.is_writable() {
            return None;
        }

        if !slot.has_pending_write() {
            if slot.is_closing() {
                return None;
            }
            let len = self.handler.produce_output(id);
            if len == 0 {
                return None;
            }
            slot.stage_write(len);
        }

        let staged = self.handler.staged_output(id);
        match slot.write_staged(staged, &mut self.stats.bytes_written) {
            WriteEvent::Drained | WriteEvent::WouldBlock => None,
            WriteEvent::Failed(e) => {
                tracing::debug!(connection = %id, error = %e, "Write failed");
                Some(Teardown::Abort)
            }
        }
    }

    fn check_status(&mut self, id: ConnectionId, now: Instant) -> Option<Teardown> {
        let slot = &mut self.slots[id.index()];
        if !slot.is_closing() && self.handler.status(id) == ConnectionStatus::Closing {
            slot.set_closing();
        }

        if slot.is_closing() && !slot.has_pending_write() {
            Some(Teardown::Close)
        } else if slot.is_idle(now, self.settings.idle_timeout) {
            Some(Teardown::Timeout)
        } else {
            None
        }
    }

    fn teardown(&mut self, id: ConnectionId, how: Teardown) {
        let slot = &mut self.slots[id.index()];
        let peer = slot.peer();
        if let Some(mut stream) = slot.release() {
            if let Err(e) = self.poll.registry().deregister(&mut stream) {
                tracing::debug!(connection = %id, error = %e, "Deregister failed");
            }
            match how {
                Teardown::Close => {
                    // Already gone if the peer closed first.
                    let _ = stream.shutdown(Shutdown::Write);
                }
                Teardown::Abort | Teardown::Timeout => abort(&stream),
            }
        }

        match how {
            Teardown::Close => self.stats.closed += 1,
            Teardown::Abort => self.stats.aborted += 1,
            Teardown::Timeout => {
                self.stats.timed_out += 1;
                tracing::warn!(connection = %id, "Idle timeout");
            }
        }
        tracing::info!(
            service = self.settings.service,
            connection = %id,
            peer = ?peer,
            reason = ?how,
            "Dropped"
        );

        self.handler.on_drop(id);
        self.pool.release(id.index());
    }
}

impl<H: ConnectionHandler> std::fmt::Debug for Multiplexer<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("service", &self.settings.service)
            .field("local_addr", &self.local_addr)
            .field("live", &self.pool.live_count())
            .field("capacity", &self.pool.capacity())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn listen(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(TcpListener::from_std(socket.into()))
}

/// Resets the connection instead of closing it; unsent data is discarded.
fn abort(stream: &TcpStream) {
    if let Err(e) = SockRef::from(stream).set_linger(Some(Duration::ZERO)) {
        tracing::debug!(error = %e, "SO_LINGER not set");
    }
}
