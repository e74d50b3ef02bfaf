//! # Ashgate Shared
//!
//! Values both services agree on: fixed protocol constants baked into the
//! client build, and the TOML configuration loaded once at startup.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod constants;

pub use config::{
    AccountConfig, ArenaConfig, ConfigError, GameConfig, LoginConfig, RsaConfig, ServiceConfig,
};
pub use constants::{CLIENT_VERSION, GAME_HANDSHAKE_LEN, LOGIN_HANDSHAKE_LEN, RSA_BLOCK_LEN};
