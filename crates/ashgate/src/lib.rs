//! # Ashgate
//!
//! Login and game services for the 8.60 client, in one process.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 ServiceLoop                  │
//! │   every tick:  login.poll()  ->  game.poll() │
//! ├──────────────────────┬───────────────────────┤
//! │  Multiplexer         │  Multiplexer          │
//! │  <LoginService>      │  <GameService>        │
//! ├──────────────────────┴───────────────────────┤
//! │     Arena  ·  RsaKey  ·  ServiceConfig       │
//! └──────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod service;

pub use service::{ServiceError, ServiceLoop};

// Re-export the layers
pub use ashgate_core as core;
pub use ashgate_crypto as crypto;
pub use ashgate_networking as networking;
pub use ashgate_shared as shared;
