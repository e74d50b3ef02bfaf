//! # Configuration Management
//!
//! Service configuration, loaded once from TOML at startup.
//!
//! Every field has a default matching the stock deployment, so an empty file
//! (or no file at all) gives a working login service on 7171 and a game
//! service on 7172 with one test account.
//!
//! ## Example
//!
//! ```toml
//! tick_interval_ms = 33
//!
//! [login]
//! bind = "0.0.0.0:7171"
//! max_connections = 10
//!
//! [[accounts]]
//! name = "account"
//! characters = ["Player"]
//! ```

use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

use crate::constants::{
    GAME_HANDSHAKE_LEN, GAME_PORT, LOGIN_HANDSHAKE_LEN, LOGIN_PORT, MAX_CREDENTIAL_LEN,
    TICK_INTERVAL_MS,
};

/// Reply buffer each login session carves from the arena.
pub const LOGIN_WRITE_BUFFER_SIZE: usize = 512;

/// Smallest outbound buffer that still fits the world snapshot sent on login.
pub const MIN_OUTPUT_BUFFER_SIZE: usize = 13 * 1024;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// One or more values are out of range.
    #[error("configuration validation failed:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

/// Top-level configuration for both services.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,

    /// Service loop interval in milliseconds.
    pub tick_interval_ms: u64,

    /// Process-wide memory reservation.
    pub arena: ArenaConfig,

    /// Login service settings.
    pub login: LoginConfig,

    /// Game service settings.
    pub game: GameConfig,

    /// RSA key override; the built-in key is used when absent.
    pub rsa: Option<RsaConfig>,

    /// Known accounts.
    pub accounts: Vec<AccountConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: String::from("info"),
            tick_interval_ms: TICK_INTERVAL_MS,
            arena: ArenaConfig::default(),
            login: LoginConfig::default(),
            game: GameConfig::default(),
            rsa: None,
            accounts: vec![AccountConfig::default()],
        }
    }
}

impl ServiceConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] or [`ConfigError::Parse`]. The result is not
    /// validated; call [`ServiceConfig::validate_strict`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Loads configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] if the text does not match the schema.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Returns the service loop interval.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Looks an account up by name.
    #[must_use]
    pub fn account(&self, name: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|account| account.name == name)
    }

    /// Returns the sealed size of the MOTD and character list sent to `account`.
    ///
    /// Both go out in one frame built in a [`LOGIN_WRITE_BUFFER_SIZE`] buffer.
    #[must_use]
    pub fn login_reply_len(&self, account: &AccountConfig) -> usize {
        let login = &self.login;
        let motd = 1 + 2 + login.motd.len();
        let entries: usize = account
            .characters
            .iter()
            .map(|name| 2 + name.len() + 2 + login.world_name.len() + 4 + 2)
            .sum();
        let payload = motd + 1 + 1 + entries + 2;
        // Outer length and checksum, then the inner length and payload
        // padded to the cipher block.
        2 + 4 + (2 + payload).next_multiple_of(8)
    }

    /// Rough upper bound on arena bytes the services will carve.
    ///
    /// Covers per-slot read buffers, login reply buffers and a worst case of
    /// every game session holding a full outbound queue.
    #[must_use]
    pub fn arena_estimate(&self) -> usize {
        let login = self.login.max_connections * (self.login.read_buffer_size + LOGIN_WRITE_BUFFER_SIZE);
        let game_reads = self.game.max_connections * self.game.read_buffer_size;
        let game_outbound = self.game.max_connections
            * (self.game.max_queued_messages + 1)
            * self.game.output_buffer_size;
        login + game_reads + game_outbound
    }

    /// Checks every value, collecting all problems.
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.log_level.parse::<Level>().is_err() {
            errors.push(format!(
                "Invalid log level: '{}' (expected trace, debug, info, warn or error)",
                self.log_level
            ));
        }

        if self.tick_interval_ms == 0 {
            errors.push("Tick interval must be greater than 0".to_string());
        } else if self.tick_interval_ms > 1000 {
            errors.push(format!(
                "Tick interval too long: {}ms (maximum: 1000ms)",
                self.tick_interval_ms
            ));
        }

        errors.extend(self.arena.validate());
        errors.extend(self.login.validate());
        errors.extend(self.game.validate());

        if let Some(rsa) = &self.rsa {
            errors.extend(rsa.validate());
        }

        if self.accounts.is_empty() {
            errors.push("At least one account must be configured".to_string());
        }
        for (i, account) in self.accounts.iter().enumerate() {
            errors.extend(account.validate());
            if self.accounts[..i].iter().any(|other| other.name == account.name) {
                errors.push(format!("Duplicate account name: '{}'", account.name));
            }
            let reply = self.login_reply_len(account);
            if reply > LOGIN_WRITE_BUFFER_SIZE {
                errors.push(format!(
                    "Character list for account '{}' too large: {reply} bytes (maximum: {LOGIN_WRITE_BUFFER_SIZE})",
                    account.name
                ));
            }
        }

        if self.arena.reserve_bytes < self.arena_estimate() {
            errors.push(format!(
                "Arena reservation too small: {} bytes, services need up to {} bytes",
                self.arena.reserve_bytes,
                self.arena_estimate()
            ));
        }

        errors
    }

    /// Validate and return Result - convenience method.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] listing every problem found.
    pub fn validate_strict(&self) -> Result<(), ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

/// Arena reservation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Bytes reserved up front.
    pub reserve_bytes: usize,
    /// Commit increment.
    pub granule_bytes: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            reserve_bytes: 64 * 1024 * 1024,
            granule_bytes: 1024 * 1024,
        }
    }
}

impl ArenaConfig {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.reserve_bytes == 0 {
            errors.push("Arena reservation must be greater than 0".to_string());
        }
        if self.granule_bytes == 0 {
            errors.push("Arena granule must be greater than 0".to_string());
        } else if self.granule_bytes > self.reserve_bytes {
            errors.push("Arena granule cannot exceed the reservation".to_string());
        }
        errors
    }
}

/// Login service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Listen address.
    pub bind: SocketAddr,
    /// Slot count.
    pub max_connections: usize,
    /// Per-slot read buffer.
    pub read_buffer_size: usize,
    /// Idle deadline per connection in milliseconds.
    pub idle_timeout_ms: u64,
    /// Message of the day shown before the character list.
    pub motd: String,
    /// World name shown next to each character.
    pub world_name: String,
    /// Game service address advertised to clients.
    pub game_host: Ipv4Addr,
    /// Game service port advertised to clients.
    pub game_port: u16,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], LOGIN_PORT)),
            max_connections: 10,
            read_buffer_size: 256,
            idle_timeout_ms: 30_000,
            motd: String::from("1\nWelcome to Ashgate!"),
            world_name: String::from("Ashgate"),
            game_host: Ipv4Addr::LOCALHOST,
            game_port: GAME_PORT,
        }
    }
}

impl LoginConfig {
    /// Returns the idle deadline.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        validate_slots("Login", self.max_connections, &mut errors);
        validate_read_buffer("Login", self.read_buffer_size, LOGIN_HANDSHAKE_LEN, &mut errors);
        if self.idle_timeout_ms < 100 {
            errors.push("Login idle timeout too short (minimum: 100ms)".to_string());
        }
        if self.game_port == 0 {
            errors.push("Advertised game port cannot be 0".to_string());
        }
        errors
    }
}

/// Game service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GameConfig {
    /// Listen address.
    pub bind: SocketAddr,
    /// Slot count.
    pub max_connections: usize,
    /// Per-slot read buffer.
    pub read_buffer_size: usize,
    /// Idle deadline per connection in milliseconds.
    pub idle_timeout_ms: u64,
    /// Size of each pooled outbound buffer.
    pub output_buffer_size: usize,
    /// Outbound buffers a session may queue before it is disconnected.
    pub max_queued_messages: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], GAME_PORT)),
            max_connections: 100,
            read_buffer_size: 2048,
            idle_timeout_ms: 60_000,
            output_buffer_size: 16 * 1024,
            max_queued_messages: 8,
        }
    }
}

impl GameConfig {
    /// Returns the idle deadline.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        validate_slots("Game", self.max_connections, &mut errors);
        validate_read_buffer("Game", self.read_buffer_size, GAME_HANDSHAKE_LEN, &mut errors);
        if self.idle_timeout_ms < 100 {
            errors.push("Game idle timeout too short (minimum: 100ms)".to_string());
        }
        if self.output_buffer_size < MIN_OUTPUT_BUFFER_SIZE {
            errors.push(format!(
                "Game output buffer too small: {} (minimum: {MIN_OUTPUT_BUFFER_SIZE})",
                self.output_buffer_size
            ));
        } else if self.output_buffer_size > usize::from(u16::MAX) {
            errors.push(format!(
                "Game output buffer too large: {} (maximum: 65535)",
                self.output_buffer_size
            ));
        }
        if self.max_queued_messages == 0 {
            errors.push("Game outbound queue must hold at least one message".to_string());
        }
        errors
    }
}

fn validate_slots(service: &str, max_connections: usize, errors: &mut Vec<String>) {
    if max_connections == 0 {
        errors.push(format!("{service} max connections must be greater than 0"));
    } else if max_connections > usize::from(u16::MAX) {
        errors.push(format!(
            "{service} max connections too high: {max_connections} (maximum: 65535)"
        ));
    }
}

fn validate_read_buffer(service: &str, size: usize, handshake: usize, errors: &mut Vec<String>) {
    if size < handshake {
        errors.push(format!(
            "{service} read buffer too small: {size} (must hold the {handshake}-byte handshake)"
        ));
    } else if size > usize::from(u16::MAX) {
        errors.push(format!("{service} read buffer too large: {size} (maximum: 65535)"));
    }
}

/// Decimal RSA key components.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RsaConfig {
    /// First prime.
    pub p: String,
    /// Second prime.
    pub q: String,
    /// Public exponent.
    #[serde(default = "default_exponent")]
    pub e: String,
}

fn default_exponent() -> String {
    String::from("65537")
}

impl RsaConfig {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (name, value) in [("p", &self.p), ("q", &self.q), ("e", &self.e)] {
            if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                errors.push(format!("RSA component '{name}' must be a decimal integer"));
            }
        }
        errors
    }
}

/// One account in the account book.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Account name.
    pub name: String,
    /// Password; empty accepts any password.
    pub password: String,
    /// Premium days reported in the character list.
    pub premium_days: u16,
    /// Characters on this account.
    pub characters: Vec<String>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            name: String::from("account"),
            password: String::new(),
            premium_days: 1,
            characters: vec![String::from("Player")],
        }
    }
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("name", &self.name)
            .field("premium_days", &self.premium_days)
            .field("characters", &self.characters)
            .finish_non_exhaustive()
    }
}

impl AccountConfig {
    /// Checks a presented password.
    #[must_use]
    pub fn accepts_password(&self, password: &str) -> bool {
        self.password.is_empty() || self.password == password
    }

    /// Checks whether a character belongs to this account.
    #[must_use]
    pub fn has_character(&self, character: &str) -> bool {
        self.characters.iter().any(|c| c == character)
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.is_empty() {
            errors.push("Account name cannot be empty".to_string());
        }
        for (what, value) in std::iter::once(("Account name", &self.name))
            .chain(std::iter::once(("Password", &self.password)))
            .chain(self.characters.iter().map(|c| ("Character name", c)))
        {
            if value.len() > MAX_CREDENTIAL_LEN {
                errors.push(format!(
                    "{what} '{}' too long (maximum: {MAX_CREDENTIAL_LEN} bytes)",
                    if what == "Password" { "***" } else { value.as_str() }
                ));
            }
        }
        if self.characters.is_empty() {
            errors.push(format!("Account '{}' has no characters", self.name));
        } else if self.characters.len() > usize::from(u8::MAX) {
            errors.push(format!("Account '{}' has too many characters", self.name));
        }
        errors
    }
}
