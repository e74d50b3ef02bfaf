//! # Ashgate Networking
//!
//! Everything between the socket and the protocol state machines.
//!
//! ## Architecture
//!
//! - **Server**: a readiness-driven [`Multiplexer`] over a fixed slot table.
//!   It frames inbound bytes by their 2-byte length prefix and pulls outbound
//!   bytes from a [`ConnectionHandler`] only when the socket can take them.
//! - **Protocol**: the frame codec (Adler-32 + XTEA + padding), the two RSA
//!   handshakes, and reply builders.
//! - **Login**: credential handshake, then a character list, then close.
//! - **Game**: challenge, handshake, world snapshot, then command dispatch.
//!
//! ## Connection Model
//!
//! ```text
//! CLIENT                              SERVER
//!   |                                    |
//!   |--- len | handshake (RSA) --------->|  <- key + credentials
//!   |<-- len | sum | XTEA{reply} --------|
//!   |--- len | sum | XTEA{command} ----->|
//!   |                                    |
//! ```
//!
//! Any framing or protocol violation disconnects. Nothing is retried.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ashgate_networking::{LoginService, Multiplexer, MultiplexerSettings};
//!
//! let service = LoginService::new(&arena, Rc::clone(&rsa), Rc::clone(&config));
//! let mut login = Multiplexer::bind(settings, service, &arena)?;
//! loop {
//!     login.poll()?;
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod game;
pub mod login;
pub mod protocol;
pub mod server;

// Re-exports for convenience
pub use error::{FrameError, HandshakeError, NetworkError, NetworkResult};
pub use game::{GameService, GameState};
pub use login::{LoginService, LoginState};
pub use protocol::{PacketReader, PacketWriter};
pub use server::{
    ConnectionHandler, ConnectionId, ConnectionStatus, Multiplexer, MultiplexerSettings,
    MultiplexerStats, TickLoop, TickStats,
};
