//! # Connection Slots
//!
//! Per-connection transport state, preallocated once per multiplexer slot.
//!
//! ## Design
//!
//! - Fixed-size read buffer carved from the arena at startup
//! - Length prefix, then body, then back to the prefix
//! - Write cursor into a handler-owned buffer; no copy

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use ashgate_core::ArenaBlock;
use mio::net::TcpStream;

/// Bytes of the length prefix in front of every message.
pub const LENGTH_PREFIX_LEN: usize = 2;

/// Read sub-state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadState {
    /// Waiting for the 2-byte length prefix.
    #[default]
    AwaitingLength,
    /// Waiting for `target` body bytes.
    AwaitingBody,
}

/// Result of pulling bytes off a socket.
#[derive(Debug)]
pub enum ReadEvent {
    /// A whole message of this many bytes sits at the front of the read buffer.
    Message(usize),
    /// The socket has nothing more for now.
    WouldBlock,
    /// The peer closed its end.
    PeerClosed,
    /// The declared body length is zero or exceeds the read buffer.
    BadLength(usize),
    /// Any other socket error.
    Failed(io::Error),
}

/// Result of pushing staged bytes into a socket.
#[derive(Debug)]
pub enum WriteEvent {
    /// Everything staged has been written.
    Drained,
    /// The socket is full; the rest waits for the next writable event.
    WouldBlock,
    /// Any socket error.
    Failed(io::Error),
}

/// One multiplexer slot.
#[derive(Debug)]
pub struct ConnectionSlot {
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,
    read_state: ReadState,
    length_prefix: [u8; LENGTH_PREFIX_LEN],
    read_buffer: ArenaBlock,
    read_pos: usize,
    read_target: usize,
    write_pos: usize,
    write_len: usize,
    readable: bool,
    writable: bool,
    closing: bool,
    last_activity: Instant,
}

impl ConnectionSlot {
    /// Creates a free slot around an arena-owned read buffer.
    #[must_use]
    pub fn new(read_buffer: ArenaBlock) -> Self {
        Self {
            stream: None,
            peer: None,
            read_state: ReadState::AwaitingLength,
            length_prefix: [0; LENGTH_PREFIX_LEN],
            read_buffer,
            read_pos: 0,
            read_target: LENGTH_PREFIX_LEN,
            write_pos: 0,
            write_len: 0,
            readable: false,
            writable: false,
            closing: false,
            last_activity: Instant::now(),
        }
    }

    /// Binds an accepted socket to this slot.
    pub fn bind(&mut self, stream: TcpStream, peer: SocketAddr) {
        self.stream = Some(stream);
        self.peer = Some(peer);
        self.reset_read();
        self.write_pos = 0;
        self.write_len = 0;
        self.readable = false;
        self.writable = false;
        self.closing = false;
        self.last_activity = Instant::now();
    }

    /// Unbinds the socket and zeroes everything it left behind.
    pub fn release(&mut self) -> Option<TcpStream> {
        self.read_buffer.zero();
        self.length_prefix = [0; LENGTH_PREFIX_LEN];
        self.peer = None;
        self.reset_read();
        self.write_pos = 0;
        self.write_len = 0;
        self.readable = false;
        self.writable = false;
        self.closing = false;
        self.stream.take()
    }

    /// Returns the bound socket.
    pub fn stream_mut(&mut self) -> Option<&mut TcpStream> {
        self.stream.as_mut()
    }

    /// Returns the peer address.
    #[must_use]
    pub const fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Returns the read sub-state.
    #[must_use]
    pub const fn read_state(&self) -> ReadState {
        self.read_state
    }

    /// Records readiness reported by the poller.
    pub fn mark_ready(&mut self, readable: bool, writable: bool) {
        self.readable |= readable;
        self.writable |= writable;
    }

    /// Returns true if the poller said there may be bytes to read.
    #[must_use]
    pub const fn is_readable(&self) -> bool {
        self.readable
    }

    /// Returns true if the poller said the socket can take bytes.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.writable
    }

    /// Returns true once the handler asked for a close.
    #[must_use]
    pub const fn is_closing(&self) -> bool {
        self.closing
    }

    /// Latches the close request.
    pub fn set_closing(&mut self) {
        self.closing = true;
    }

    /// Returns true if part of a staged buffer is still unwritten.
    #[must_use]
    pub const fn has_pending_write(&self) -> bool {
        self.write_pos < self.write_len
    }

    /// Starts writing a freshly staged buffer of `len` bytes.
    pub fn stage_write(&mut self, len: usize) {
        self.write_pos = 0;
        self.write_len = len;
    }

    /// Returns true if nothing moved for longer than `timeout`.
    #[must_use]
    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) > timeout
    }

    /// Returns the completed message body.
    pub fn message_mut(&mut self, len: usize) -> &mut [u8] {
        &mut self.read_buffer[..len]
    }

    /// Goes back to waiting for a length prefix.
    pub fn reset_read(&mut self) {
        self.read_state = ReadState::AwaitingLength;
        self.read_pos = 0;
        self.read_target = LENGTH_PREFIX_LEN;
    }

    /// Reads until a message completes or the socket runs dry.
    ///
    /// `bytes_read` is increased by every byte taken off the socket. After a
    /// [`ReadEvent::Message`] the caller must consume the body and call
    /// [`ConnectionSlot::reset_read`] before reading again.
    pub fn read_message(&mut self, bytes_read: &mut u64) -> ReadEvent {
        let Some(stream) = self.stream.as_mut() else {
            return ReadEvent::PeerClosed;
        };

        loop {
            let dest = match self.read_state {
                ReadState::AwaitingLength => &mut self.length_prefix[self.read_pos..],
                ReadState::AwaitingBody => &mut self.read_buffer[self.read_pos..self.read_target],
            };

            match stream.read(dest) {
                Ok(0) => return ReadEvent::PeerClosed,
                Ok(n) => {
                    self.read_pos += n;
                    *bytes_read += n as u64;
                    self.last_activity = Instant::now();
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.readable = false;
                    return ReadEvent::WouldBlock;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return ReadEvent::Failed(e),
            }

            if self.read_pos < self.read_target {
                continue;
            }

            match self.read_state {
                ReadState::AwaitingLength => {
                    let len = usize::from(u16::from_le_bytes(self.length_prefix));
                    if len == 0 || len > self.read_buffer.len() {
                        return ReadEvent::BadLength(len);
                    }
                    self.read_state = ReadState::AwaitingBody;
                    self.read_pos = 0;
                    self.read_target = len;
                }
                ReadState::AwaitingBody => return ReadEvent::Message(self.read_target),
            }
        }
    }

    /// Writes the unwritten part of `staged` until drained or the socket fills.
    ///
    /// `staged` is the full buffer the handler staged; the slot remembers how
    /// much of it already went out.
    pub fn write_staged(&mut self, staged: &[u8], bytes_written: &mut u64) -> WriteEvent {
        let Some(stream) = self.stream.as_mut() else {
            return WriteEvent::Failed(io::ErrorKind::NotConnected.into());
        };

        let end = self.write_len.min(staged.len());
        while self.write_pos < end {
            match stream.write(&staged[self.write_pos..end]) {
                Ok(0) => return WriteEvent::Failed(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.write_pos += n;
                    *bytes_written += n as u64;
                    self.last_activity = Instant::now();
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.writable = false;
                    return WriteEvent::WouldBlock;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return WriteEvent::Failed(e),
            }
        }
        self.write_pos = self.write_len;
        WriteEvent::Drained
    }
}
