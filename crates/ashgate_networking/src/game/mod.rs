//! # Game Service
//!
//! Challenge, handshake, world snapshot, then commands until logout.
//!
//! ```text
//! HandshakeWriting ─> HandshakeWaitingWrite ─> HandshakeReading ─> Normal
//!                                                    │               │
//!                                                    └──> DisconnectWriting ─> DisconnectWaitingWrite ─> Disconnecting
//! ```
//!
//! The server speaks first: a fixed challenge frame goes out before the
//! client sends its handshake. Replies are collected into pooled buffers on a
//! bounded queue and sealed one frame at a time as the socket drains.

mod outbound;

pub use outbound::{OutboundMessage, OutboundQueue};

use std::net::SocketAddr;
use std::rc::Rc;

use ashgate_core::{Arena, BufferPool};
use ashgate_crypto::{RsaKey, XteaKey};
use ashgate_shared::ServiceConfig;

use crate::login::version_rejection;
use crate::protocol::codec;
use crate::protocol::handshake::{self, Credential, GameHandshake};
use crate::protocol::packets::{self, tags};
use crate::protocol::serialization::{parse_leading_int, PacketReader, PacketWriter};
use crate::server::{ConnectionHandler, ConnectionId, ConnectionStatus};

/// First frame on every game connection, already sealed.
pub const CHALLENGE: [u8; 14] = [
    0x0C, 0x00, // outer length
    0x23, 0x03, 0xE8, 0x0A, // checksum
    0x06, 0x00, // payload length
    0x1F, 0xFF, 0xFF, 0x00, 0x00, 0xFF,
];

/// Reason sent for an unknown account or wrong password.
pub const INVALID_ACCOUNT: &str = "Invalid account.";

/// Reason sent for a character the account does not own.
pub const INVALID_CHARACTER: &str = "Invalid character.";

/// Speak type the say command must carry.
const SPEAK_SAY: u8 = 0x01;

/// Longest say text read; longer text reads as empty.
const SAY_LIMIT: usize = 256;

/// Inventory slot the say command fills.
const SAY_ITEM_SLOT: u8 = 6;

/// Bytes asked of the queue per reply kind; 0 forces a frame of its own.
const DISCONNECT_RESERVE: usize = 256;
const WORLD_LOGIN_RESERVE: usize = 0;
const INVENTORY_RESERVE: usize = 4;
const RELOGIN_RESERVE: usize = 1;

/// Game session state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GameState {
    /// Challenge not yet handed to the transport.
    #[default]
    HandshakeWriting,
    /// Challenge handed to the transport.
    HandshakeWaitingWrite,
    /// Waiting for the handshake.
    HandshakeReading,
    /// Logged in.
    Normal,
    /// A disconnect reply is queued.
    DisconnectWriting,
    /// The disconnect reply is being written.
    DisconnectWaitingWrite,
    /// Done; the transport may close.
    Disconnecting,
}

/// Per-connection game state.
#[derive(Debug)]
pub struct GameSession {
    state: GameState,
    peer: Option<SocketAddr>,
    key: XteaKey,
    account: Credential,
    character: Credential,
    password: Credential,
    queue: OutboundQueue,
    staged: Option<OutboundMessage>,
    challenge_staged: bool,
}

impl GameSession {
    fn new(max_queued: usize) -> Self {
        Self {
            state: GameState::HandshakeWriting,
            peer: None,
            key: XteaKey::default(),
            account: Credential::new(),
            character: Credential::new(),
            password: Credential::new(),
            queue: OutboundQueue::new(max_queued),
            staged: None,
            challenge_staged: false,
        }
    }

    /// Returns the session state.
    #[must_use]
    pub const fn state(&self) -> GameState {
        self.state
    }

    /// Returns the logged-in character name.
    #[must_use]
    pub fn character(&self) -> &[u8] {
        self.character.as_bytes()
    }

    /// Returns the number of frames waiting to be sent.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if nothing from a previous connection is left behind.
    #[must_use]
    pub fn is_vacant(&self) -> bool {
        self.peer.is_none()
            && self.key == XteaKey::default()
            && self.account.is_empty()
            && self.character.is_empty()
            && self.password.is_empty()
            && self.queue.is_empty()
            && self.staged.is_none()
    }

    fn clear(&mut self, pool: &mut BufferPool) {
        if let Some(staged) = self.staged.take() {
            pool.release(staged.into_block());
        }
        self.queue.drain_into(pool);
        self.state = GameState::HandshakeWriting;
        self.peer = None;
        self.key = XteaKey::default();
        self.account.clear();
        self.character.clear();
        self.password.clear();
        self.challenge_staged = false;
    }

    /// Drops the connection without a reply.
    fn disconnect(&mut self) {
        self.state = GameState::Disconnecting;
    }

    /// Appends a reply; a full queue drops the connection instead.
    fn queue_reply(
        &mut self,
        pool: &mut BufferPool,
        size: usize,
        build: impl FnOnce(&mut PacketWriter<'_>),
    ) {
        match self.queue.reserve(pool, size) {
            Some(message) => message.append(build),
            None => {
                tracing::warn!(queued = self.queue.len(), "Outbound queue full");
                self.disconnect();
            }
        }
    }

    fn send_disconnect(&mut self, pool: &mut BufferPool, reason: &str) {
        self.state = GameState::DisconnectWriting;
        self.queue_reply(pool, DISCONNECT_RESERVE, |w| {
            packets::write_game_disconnect(w, reason.as_bytes());
        });
    }

    fn send_world_login(&mut self, pool: &mut BufferPool) {
        self.state = GameState::Normal;
        let character = self.character.clone();
        self.queue_reply(pool, WORLD_LOGIN_RESERVE, |w| {
            packets::write_world_login(w, character.as_bytes());
        });
    }

    fn send_inventory_item(&mut self, pool: &mut BufferPool, slot: u8, item_id: u16) {
        self.queue_reply(pool, INVENTORY_RESERVE, |w| {
            packets::write_inventory_item(w, slot, item_id);
        });
    }

    fn send_relogin_prompt(&mut self, pool: &mut BufferPool) {
        self.queue_reply(pool, RELOGIN_RESERVE, packets::write_relogin_prompt);
    }
}

/// The game protocol, one [`GameSession`] per multiplexer slot.
#[derive(Debug)]
pub struct GameService {
    config: Rc<ServiceConfig>,
    rsa: Rc<RsaKey>,
    pool: BufferPool,
    sessions: Vec<GameSession>,
}

impl GameService {
    /// Creates a session per game slot; outbound buffers come from `arena` on demand.
    #[must_use]
    pub fn new(arena: Rc<Arena>, rsa: Rc<RsaKey>, config: Rc<ServiceConfig>) -> Self {
        let game = &config.game;
        let sessions = (0..game.max_connections)
            .map(|_| GameSession::new(game.max_queued_messages))
            .collect();
        Self {
            pool: BufferPool::new(arena, game.output_buffer_size),
            config,
            rsa,
            sessions,
        }
    }

    /// Returns the session in slot `id`.
    #[must_use]
    pub fn session(&self, id: ConnectionId) -> Option<&GameSession> {
        self.sessions.get(id.index())
    }

    /// Returns the number of sessions, one per slot.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.sessions.len()
    }

    /// Returns the outbound buffer pool.
    #[must_use]
    pub const fn pool(&self) -> &BufferPool {
        &self.pool
    }

    fn handle_handshake(&mut self, id: ConnectionId, message: &mut [u8]) {
        let session = &mut self.sessions[id.index()];
        let login = match handshake::decode_game(message, &self.rsa) {
            Ok(login) => login,
            Err(e) => {
                tracing::warn!(connection = %id, error = %e, "Bad game handshake");
                session.disconnect();
                return;
            }
        };

        session.key = login.key;
        if !login.version_ok() {
            tracing::info!(connection = %id, version = login.version, "Client version rejected");
            session.send_disconnect(&mut self.pool, &version_rejection());
            return;
        }

        let GameHandshake {
            account,
            character,
            password,
            ..
        } = login;
        session.account = account;
        session.character = character;
        session.password = password;

        match check_login(&self.config, session) {
            Ok(()) => {
                tracing::info!(
                    connection = %id,
                    account = session.account.as_str().unwrap_or_default(),
                    character = session.character.as_str().unwrap_or_default(),
                    "Player login"
                );
                session.send_world_login(&mut self.pool);
            }
            Err(reason) => {
                tracing::info!(connection = %id, reason, "Player login rejected");
                session.send_disconnect(&mut self.pool, reason);
            }
        }
    }

    fn handle_command(&mut self, id: ConnectionId, message: &mut [u8]) {
        let session = &mut self.sessions[id.index()];
        let payload = match codec::unwrap(message, &session.key) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(connection = %id, error = %e, "Bad frame");
                session.disconnect();
                return;
            }
        };

        let mut reader = PacketReader::new(payload);
        let Some(tag) = reader.read_u8() else {
            return;
        };

        match tag {
            tags::CLIENT_LOGOUT => {
                tracing::info!(connection = %id, "Logout");
                session.disconnect();
            }
            tags::CLIENT_SAY => {
                if reader.read_u8() != Some(SPEAK_SAY) {
                    tracing::warn!(connection = %id, "Unsupported speak type");
                    session.disconnect();
                    return;
                }
                let text = reader.read_string(SAY_LIMIT).unwrap_or_default();
                // Truncation to u16 is part of the command's behavior.
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let value = parse_leading_int(text) as u16;
                tracing::debug!(connection = %id, value, "Say");
                match value {
                    100.. => session.send_inventory_item(&mut self.pool, SAY_ITEM_SLOT, value),
                    14 => session.send_disconnect(&mut self.pool, "test"),
                    15 => session.send_relogin_prompt(&mut self.pool),
                    _ => {}
                }
            }
            other => tracing::trace!(connection = %id, tag = other, "Ignored command"),
        }
    }
}

/// Checks the account book; returns the rejection reason on failure.
fn check_login(config: &ServiceConfig, session: &GameSession) -> Result<(), &'static str> {
    let account = session
        .account
        .as_str()
        .and_then(|name| config.account(name))
        .filter(|account| account.accepts_password(session.password.as_str().unwrap_or_default()))
        .ok_or(INVALID_ACCOUNT)?;

    match session.character.as_str() {
        Some(character) if account.has_character(character) => Ok(()),
        _ => Err(INVALID_CHARACTER),
    }
}

impl ConnectionHandler for GameService {
    fn on_accept(&mut self, id: ConnectionId, peer: SocketAddr) {
        let session = &mut self.sessions[id.index()];
        session.clear(&mut self.pool);
        session.peer = Some(peer);
    }

    fn on_drop(&mut self, id: ConnectionId) {
        self.sessions[id.index()].clear(&mut self.pool);
    }

    fn on_read(&mut self, id: ConnectionId, message: &mut [u8]) {
        match self.sessions[id.index()].state {
            // A client only answers once it has the whole challenge, so the
            // handshake may arrive before the transport reports the flush.
            GameState::HandshakeWaitingWrite | GameState::HandshakeReading => {
                self.handle_handshake(id, message);
            }
            GameState::Normal => self.handle_command(id, message),
            GameState::DisconnectWriting | GameState::DisconnectWaitingWrite => {
                tracing::trace!(connection = %id, "Message after disconnect ignored");
            }
            state => {
                tracing::warn!(connection = %id, state = ?state, "Unexpected message");
                self.sessions[id.index()].disconnect();
            }
        }
    }

    fn produce_output(&mut self, id: ConnectionId) -> usize {
        let session = &mut self.sessions[id.index()];
        session.challenge_staged = false;

        match session.state {
            GameState::HandshakeWriting => {
                session.state = GameState::HandshakeWaitingWrite;
                session.challenge_staged = true;
                CHALLENGE.len()
            }
            GameState::HandshakeWaitingWrite => {
                session.state = GameState::HandshakeReading;
                0
            }
            GameState::Normal | GameState::DisconnectWriting => {
                if let Some(previous) = session.staged.take() {
                    self.pool.release(previous.into_block());
                }
                let Some(mut message) = session.queue.pop() else {
                    return 0;
                };
                match message.seal(&session.key) {
                    Ok(len) => {
                        tracing::trace!(connection = %id, len, "Writing frame");
                        session.staged = Some(message);
                        // The reason is the last frame queued.
                        if session.state == GameState::DisconnectWriting
                            && session.queue.is_empty()
                        {
                            session.state = GameState::DisconnectWaitingWrite;
                        }
                        len
                    }
                    Err(e) => {
                        tracing::warn!(connection = %id, error = %e, "Reply could not be sealed");
                        self.pool.release(message.into_block());
                        session.disconnect();
                        0
                    }
                }
            }
            GameState::DisconnectWaitingWrite => {
                session.disconnect();
                0
            }
            GameState::HandshakeReading | GameState::Disconnecting => 0,
        }
    }

    fn staged_output(&self, id: ConnectionId) -> &[u8] {
        let session = &self.sessions[id.index()];
        if session.challenge_staged {
            &CHALLENGE[..]
        } else {
            session.staged.as_ref().map_or(&[][..], OutboundMessage::frame)
        }
    }

    fn status(&self, id: ConnectionId) -> ConnectionStatus {
        match self.sessions[id.index()].state {
            GameState::Disconnecting => ConnectionStatus::Closing,
            _ => ConnectionStatus::Open,
        }
    }
}
