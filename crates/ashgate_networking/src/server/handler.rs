//! # Connection Handler
//!
//! The contract between the multiplexer and a protocol.

use std::fmt;
use std::net::SocketAddr;

/// Identifies one connection slot of a multiplexer.
///
/// A plain slot index. It is reused once the slot is freed, so a handler
/// must not keep it past [`ConnectionHandler::on_drop`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for ConnectionId {
    #[allow(clippy::cast_possible_truncation)]
    fn from(index: usize) -> Self {
        // Slot counts are validated to fit u16.
        Self(index as u32)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a handler wants done with a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Keep it open.
    #[default]
    Open,
    /// Close once staged output has drained.
    Closing,
}

/// Protocol callbacks driven by a [`Multiplexer`](super::Multiplexer).
///
/// One implementation per protocol. The multiplexer owns sockets and
/// framing; the handler owns sessions, indexed by [`ConnectionId`].
///
/// Output is pulled: the multiplexer asks for bytes only when the socket can
/// take them, and writes the staged buffer to completion before asking again.
pub trait ConnectionHandler {
    /// A connection was bound to slot `id`.
    fn on_accept(&mut self, id: ConnectionId, peer: SocketAddr);

    /// The connection in slot `id` is gone; the slot is about to be reused.
    fn on_drop(&mut self, id: ConnectionId);

    /// A complete message arrived. `message` excludes the 2-byte length
    /// prefix and may be modified in place.
    fn on_read(&mut self, id: ConnectionId, message: &mut [u8]);

    /// Stages the next output buffer and returns its length; 0 if there is
    /// nothing to send.
    ///
    /// Called again only after the previous buffer has been written out, so
    /// a handler may reuse or release the previous buffer here.
    fn produce_output(&mut self, id: ConnectionId) -> usize;

    /// Returns the buffer staged by the last [`produce_output`](Self::produce_output).
    fn staged_output(&self, id: ConnectionId) -> &[u8];

    /// Returns whether the connection should be closed.
    fn status(&self, id: ConnectionId) -> ConnectionStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id() {
        let id = ConnectionId::from(7usize);
        assert_eq!(id.index(), 7);
        assert_eq!(id.to_string(), "#7");
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Open);
    }
}
