//! # Protocol Constants
//!
//! **CRITICAL:** These values are baked into the client binary.
//! Changing them breaks every client in the wild.

// =============================================================================
// CLIENT BUILD
// =============================================================================

/// The only client build both services accept.
pub const CLIENT_VERSION: u16 = 860;

/// Human-readable form of [`CLIENT_VERSION`], shown in rejections.
pub const CLIENT_VERSION_TEXT: &str = "8.60";

// =============================================================================
// HANDSHAKES
// =============================================================================

/// Size of one RSA block in either handshake.
pub const RSA_BLOCK_LEN: usize = 128;

/// Bytes an RSA block must decode to.
pub const RSA_PLAINTEXT_LEN: usize = 127;

/// Login handshake body, outer length excluded.
pub const LOGIN_HANDSHAKE_LEN: usize = 149;

/// Game handshake body, outer length excluded.
pub const GAME_HANDSHAKE_LEN: usize = 137;

/// Longest account name, character name or password kept in a session.
pub const MAX_CREDENTIAL_LEN: usize = 31;

// =============================================================================
// DEFAULT ENDPOINTS
// =============================================================================

/// Login service port.
pub const LOGIN_PORT: u16 = 7171;

/// Game service port.
pub const GAME_PORT: u16 = 7172;

/// Service loop interval in milliseconds (~30 ticks per second).
pub const TICK_INTERVAL_MS: u64 = 33;
