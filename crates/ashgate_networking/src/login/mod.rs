//! # Login Service
//!
//! Authenticates an account and answers with its character list.
//!
//! ```text
//! Reading ──handshake──> Writing ──staged──> WaitingForFlush ──drained──> Disconnecting
//!    │                                                                       ▲
//!    └──────────────── bad handshake / unexpected message ───────────────────┘
//! ```
//!
//! One request, one reply, then the connection closes.

use std::net::SocketAddr;
use std::rc::Rc;

use ashgate_core::{Arena, ArenaBlock};
use ashgate_crypto::{RsaKey, XteaKey};
use ashgate_shared::config::LOGIN_WRITE_BUFFER_SIZE;
use ashgate_shared::constants::CLIENT_VERSION_TEXT;
use ashgate_shared::{AccountConfig, ServiceConfig};

use crate::protocol::codec::{self, FRAME_HEADER_LEN};
use crate::protocol::handshake::{self, Credential};
use crate::protocol::packets::{self, CharacterEntry};
use crate::protocol::serialization::PacketWriter;
use crate::server::{ConnectionHandler, ConnectionId, ConnectionStatus};

/// Reason sent when the account is unknown or the password is wrong.
pub const INVALID_CREDENTIALS: &str = "Invalid account name or password.";

/// Reason sent to clients of any other build.
#[must_use]
pub fn version_rejection() -> String {
    format!("This server requires client version {CLIENT_VERSION_TEXT}.")
}

/// Login session state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoginState {
    /// Waiting for the handshake.
    #[default]
    Reading,
    /// Reply built, not yet handed to the transport.
    Writing,
    /// Reply handed to the transport.
    WaitingForFlush,
    /// Done; the transport may close.
    Disconnecting,
}

/// Per-connection login state.
#[derive(Debug)]
pub struct LoginSession {
    state: LoginState,
    peer: Option<SocketAddr>,
    key: XteaKey,
    account: Credential,
    password: Credential,
    write_buffer: ArenaBlock,
    write_len: usize,
}

impl LoginSession {
    fn new(write_buffer: ArenaBlock) -> Self {
        Self {
            state: LoginState::Reading,
            peer: None,
            key: XteaKey::default(),
            account: Credential::new(),
            password: Credential::new(),
            write_buffer,
            write_len: 0,
        }
    }

    /// Returns the session state.
    #[must_use]
    pub const fn state(&self) -> LoginState {
        self.state
    }

    /// Returns the account name the client presented.
    #[must_use]
    pub fn account(&self) -> &[u8] {
        self.account.as_bytes()
    }

    /// Returns true if nothing from a previous connection is left behind.
    #[must_use]
    pub fn is_vacant(&self) -> bool {
        self.state == LoginState::Reading
            && self.peer.is_none()
            && self.key == XteaKey::default()
            && self.account.is_empty()
            && self.password.is_empty()
            && self.write_len == 0
            && self.write_buffer.iter().all(|&b| b == 0)
    }

    fn clear(&mut self) {
        self.state = LoginState::Reading;
        self.peer = None;
        self.key = XteaKey::default();
        self.account.clear();
        self.password.clear();
        self.write_buffer.zero();
        self.write_len = 0;
    }

    fn disconnect(&mut self) {
        self.state = LoginState::Disconnecting;
    }

    /// Builds one sealed reply frame; disconnects if it cannot be built.
    fn reply(&mut self, build: impl FnOnce(&mut PacketWriter<'_>)) {
        let mut writer = PacketWriter::at(&mut self.write_buffer, FRAME_HEADER_LEN);
        build(&mut writer);
        let fits = writer.is_ok();
        let payload_len = writer.position() - FRAME_HEADER_LEN;

        if !fits {
            tracing::error!(capacity = self.write_buffer.len(), "Login reply does not fit");
            self.disconnect();
            return;
        }
        match codec::seal(&mut self.write_buffer, payload_len, &self.key) {
            Ok(len) => {
                self.write_len = len;
                self.state = LoginState::Writing;
            }
            Err(e) => {
                tracing::error!(error = %e, "Login reply could not be sealed");
                self.disconnect();
            }
        }
    }

    fn send_disconnect(&mut self, reason: &str) {
        self.reply(|writer| packets::write_login_disconnect(writer, reason.as_bytes()));
    }

    fn send_character_list(&mut self, account: &AccountConfig, config: &ServiceConfig) {
        let login = &config.login;
        self.reply(|writer| {
            packets::write_motd(writer, login.motd.as_bytes());
            let characters = account.characters.iter().map(|name| CharacterEntry {
                name: name.as_bytes(),
                world: login.world_name.as_bytes(),
                host: login.game_host,
                port: login.game_port,
            });
            packets::write_character_list(writer, characters, account.premium_days);
        });
    }
}

/// The login protocol, one [`LoginSession`] per multiplexer slot.
#[derive(Debug)]
pub struct LoginService {
    config: Rc<ServiceConfig>,
    rsa: Rc<RsaKey>,
    sessions: Vec<LoginSession>,
}

impl LoginService {
    /// Creates a session per login slot, each with an arena-owned reply buffer.
    #[must_use]
    pub fn new(arena: &Arena, rsa: Rc<RsaKey>, config: Rc<ServiceConfig>) -> Self {
        let sessions = (0..config.login.max_connections)
            .map(|_| LoginSession::new(arena.alloc(LOGIN_WRITE_BUFFER_SIZE, 8)))
            .collect();
        Self {
            config,
            rsa,
            sessions,
        }
    }

    /// Returns the session in slot `id`.
    #[must_use]
    pub fn session(&self, id: ConnectionId) -> Option<&LoginSession> {
        self.sessions.get(id.index())
    }

    /// Returns the number of sessions, one per slot.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.sessions.len()
    }
}

/// Finds the account and checks its password.
fn authenticate<'a>(
    config: &'a ServiceConfig,
    account: &Credential,
    password: &Credential,
) -> Option<&'a AccountConfig> {
    let found = config.account(account.as_str()?)?;
    found
        .accepts_password(password.as_str().unwrap_or_default())
        .then_some(found)
}

impl ConnectionHandler for LoginService {
    fn on_accept(&mut self, id: ConnectionId, peer: SocketAddr) {
        let session = &mut self.sessions[id.index()];
        session.clear();
        session.peer = Some(peer);
    }

    fn on_drop(&mut self, id: ConnectionId) {
        self.sessions[id.index()].clear();
    }

    fn on_read(&mut self, id: ConnectionId, message: &mut [u8]) {
        let session = &mut self.sessions[id.index()];
        if session.state != LoginState::Reading {
            tracing::warn!(connection = %id, state = ?session.state, "Unexpected message");
            session.disconnect();
            return;
        }

        let login = match handshake::decode_login(message, &self.rsa) {
            Ok(login) => login,
            Err(e) => {
                tracing::warn!(connection = %id, error = %e, "Bad login handshake");
                session.disconnect();
                return;
            }
        };

        session.key = login.key;
        if !login.version_ok() {
            tracing::info!(connection = %id, version = login.version, "Client version rejected");
            session.send_disconnect(&version_rejection());
            return;
        }

        session.account = login.account;
        session.password = login.password;

        match authenticate(&self.config, &session.account, &session.password) {
            Some(account) => {
                tracing::info!(
                    connection = %id,
                    account = %account.name,
                    characters = account.characters.len(),
                    "Account login"
                );
                session.send_character_list(account, &self.config);
            }
            None => {
                tracing::info!(connection = %id, "Invalid credentials");
                session.send_disconnect(INVALID_CREDENTIALS);
            }
        }
    }

    fn produce_output(&mut self, id: ConnectionId) -> usize {
        let session = &mut self.sessions[id.index()];
        match session.state {
            LoginState::Writing => {
                session.state = LoginState::WaitingForFlush;
                tracing::debug!(connection = %id, len = session.write_len, "Writing reply");
                session.write_len
            }
            LoginState::WaitingForFlush => {
                session.state = LoginState::Disconnecting;
                0
            }
            LoginState::Reading | LoginState::Disconnecting => 0,
        }
    }

    fn staged_output(&self, id: ConnectionId) -> &[u8] {
        let session = &self.sessions[id.index()];
        &session.write_buffer[..session.write_len]
    }

    fn status(&self, id: ConnectionId) -> ConnectionStatus {
        match self.sessions[id.index()].state {
            LoginState::Disconnecting => ConnectionStatus::Closing,
            _ => ConnectionStatus::Open,
        }
    }
}
