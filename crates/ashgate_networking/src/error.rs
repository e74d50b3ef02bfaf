//! # Networking Error Types
//!
//! Frame and handshake errors are per-connection: the session that hits one
//! disconnects. [`NetworkError`] is the only kind that leaves a poll call.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Reasons an inbound frame is rejected, or an outbound one cannot be built.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Body shorter than checksum plus one cipher block.
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    /// Encrypted region is not a whole number of cipher blocks.
    #[error("encrypted region of {0} bytes is not a multiple of 8")]
    Misaligned(usize),

    /// Checksum over the encrypted region does not match.
    #[error("checksum mismatch: frame says {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum carried in the frame.
        expected: u32,
        /// Checksum computed over the received bytes.
        actual: u32,
    },

    /// Embedded payload length runs past the decrypted region.
    #[error("payload length {declared} exceeds the {available} decrypted bytes")]
    PayloadOverflow {
        /// Length the frame declares.
        declared: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// Nothing to send.
    #[error("refusing to seal an empty payload")]
    EmptyPayload,

    /// Padded frame does not fit the output buffer.
    #[error("frame needs {needed} bytes, buffer holds {capacity}")]
    BufferTooSmall {
        /// Bytes the frame needs.
        needed: usize,
        /// Bytes the buffer holds.
        capacity: usize,
    },
}

/// Reasons a handshake message is rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeError {
    /// Message is not the fixed handshake size.
    #[error("handshake must be {expected} bytes, got {actual}")]
    Length {
        /// Required size.
        expected: usize,
        /// Received size.
        actual: usize,
    },

    /// Checksum over the message does not match.
    #[error("handshake checksum mismatch")]
    Checksum,

    /// Message type tag is wrong.
    #[error("unexpected handshake tag {0:#04x}")]
    Tag(u8),

    /// RSA block did not decode to exactly 127 bytes.
    #[error("RSA block decoded to {0} bytes")]
    RsaLength(usize),

    /// Credential fields run past the end of the RSA block.
    #[error("handshake credentials truncated")]
    Truncated,
}

/// Errors that stop a multiplexer.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying error.
        source: io::Error,
    },

    /// The readiness poller failed.
    #[error("poll failed: {0}")]
    Poll(#[source] io::Error),

    /// Any other I/O failure outside a single connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for networking operations.
pub type NetworkResult<T> = Result<T, NetworkError>;
