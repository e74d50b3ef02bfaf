//! # Handshakes
//!
//! The first message on every connection. Sent without outer framing
//! encryption; the interesting part travels in a 128-byte RSA block.
//!
//! ```text
//! login (149): checksum:u32 | 0x01 | os:u16 | version:u16 | sig:u32 x3 | rsa[128]
//! game  (137): checksum:u32 | 0x0A | os:u16 | version:u16 | rsa[128]
//!
//! login rsa -> key:u32 x4 | account:str | password:str
//! game  rsa -> key:u32 x4 | flag:u8 | account:str | character:str | password:str
//! ```

use ashgate_crypto::{adler32, CryptoError, RsaKey, XteaKey};
use ashgate_shared::constants::{
    CLIENT_VERSION, GAME_HANDSHAKE_LEN, LOGIN_HANDSHAKE_LEN, MAX_CREDENTIAL_LEN, RSA_BLOCK_LEN,
    RSA_PLAINTEXT_LEN,
};

use super::serialization::{FixedString, PacketReader, PacketWriter};
use crate::error::HandshakeError;

/// Message tag of the login handshake.
pub const LOGIN_HANDSHAKE_TAG: u8 = 0x01;

/// Message tag of the game handshake.
pub const GAME_HANDSHAKE_TAG: u8 = 0x0A;

/// Offset of the RSA block in the login handshake.
const LOGIN_RSA_OFFSET: usize = 21;

/// Offset of the RSA block in the game handshake.
const GAME_RSA_OFFSET: usize = 9;

/// Account names, character names and passwords as kept in sessions.
pub type Credential = FixedString<{ MAX_CREDENTIAL_LEN + 1 }>;

/// A decoded login handshake.
#[derive(Debug, Default)]
pub struct LoginHandshake {
    /// Client operating system id.
    pub os: u16,
    /// Declared client build.
    pub version: u16,
    /// Session key for every later frame.
    pub key: XteaKey,
    /// Account name; empty unless the version matched.
    pub account: Credential,
    /// Password; empty unless the version matched.
    pub password: Credential,
}

/// A decoded game handshake.
#[derive(Debug, Default)]
pub struct GameHandshake {
    /// Client operating system id.
    pub os: u16,
    /// Declared client build.
    pub version: u16,
    /// Session key for every later frame.
    pub key: XteaKey,
    /// Account name; empty unless the version matched.
    pub account: Credential,
    /// Character to log in; empty unless the version matched.
    pub character: Credential,
    /// Password; empty unless the version matched.
    pub password: Credential,
}

impl LoginHandshake {
    /// Returns true if the client build is the supported one.
    #[must_use]
    pub const fn version_ok(&self) -> bool {
        self.version == CLIENT_VERSION
    }
}

impl GameHandshake {
    /// Returns true if the client build is the supported one.
    #[must_use]
    pub const fn version_ok(&self) -> bool {
        self.version == CLIENT_VERSION
    }
}

/// Decodes a login handshake body in place.
///
/// The session key is always extracted, so a version mismatch can still be
/// answered with an encrypted rejection. Credentials are only read when the
/// version matches.
///
/// # Errors
///
/// Any [`HandshakeError`]; the caller disconnects without a reply.
pub fn decode_login(body: &mut [u8], rsa: &RsaKey) -> Result<LoginHandshake, HandshakeError> {
    let (os, version) = check_header(body, LOGIN_HANDSHAKE_LEN, LOGIN_HANDSHAKE_TAG)?;
    let plaintext = decrypt_block(&mut body[LOGIN_RSA_OFFSET..], rsa)?;

    let mut reader = PacketReader::new(plaintext);
    let mut handshake = LoginHandshake {
        os,
        version,
        key: read_key(&mut reader)?,
        ..LoginHandshake::default()
    };

    if handshake.version_ok() {
        handshake.account.set(read_credential(&mut reader)?);
        handshake.password.set(read_credential(&mut reader)?);
    }
    Ok(handshake)
}

/// Decodes a game handshake body in place.
///
/// Same conventions as [`decode_login`].
///
/// # Errors
///
/// Any [`HandshakeError`]; the caller disconnects without a reply.
pub fn decode_game(body: &mut [u8], rsa: &RsaKey) -> Result<GameHandshake, HandshakeError> {
    let (os, version) = check_header(body, GAME_HANDSHAKE_LEN, GAME_HANDSHAKE_TAG)?;
    let plaintext = decrypt_block(&mut body[GAME_RSA_OFFSET..], rsa)?;

    let mut reader = PacketReader::new(plaintext);
    let mut handshake = GameHandshake {
        os,
        version,
        key: read_key(&mut reader)?,
        ..GameHandshake::default()
    };

    if handshake.version_ok() {
        // GM flag, unused.
        reader.skip(1).ok_or(HandshakeError::Truncated)?;
        handshake.account.set(read_credential(&mut reader)?);
        handshake.character.set(read_credential(&mut reader)?);
        handshake.password.set(read_credential(&mut reader)?);
    }
    Ok(handshake)
}

fn check_header(body: &[u8], expected: usize, tag: u8) -> Result<(u16, u16), HandshakeError> {
    if body.len() != expected {
        return Err(HandshakeError::Length {
            expected,
            actual: body.len(),
        });
    }

    let checksum = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
    if checksum != adler32(&body[4..]) {
        return Err(HandshakeError::Checksum);
    }

    if body[4] != tag {
        return Err(HandshakeError::Tag(body[4]));
    }

    let os = u16::from_le_bytes([body[5], body[6]]);
    let version = u16::from_le_bytes([body[7], body[8]]);
    Ok((os, version))
}

fn decrypt_block<'a>(block: &'a mut [u8], rsa: &RsaKey) -> Result<&'a [u8], HandshakeError> {
    match rsa.decode(block, RSA_BLOCK_LEN) {
        Ok(RSA_PLAINTEXT_LEN) => Ok(&block[..RSA_PLAINTEXT_LEN]),
        Ok(len) => Err(HandshakeError::RsaLength(len)),
        Err(err @ CryptoError::OutputTooLarge { .. }) => rsa_key_is_broken(&err),
        Err(err) => {
            tracing::warn!(%err, "RSA decode failed");
            Err(HandshakeError::RsaLength(0))
        }
    }
}

/// A 1024-bit key cannot produce more than 128 bytes; the key is misconfigured.
fn rsa_key_is_broken(err: &CryptoError) -> ! {
    tracing::error!(%err, "RSA decode overflowed the handshake block, key is wider than 1024 bits");
    std::process::abort();
}

fn read_key(reader: &mut PacketReader<'_>) -> Result<XteaKey, HandshakeError> {
    let mut words = [0u32; 4];
    for word in &mut words {
        *word = reader.read_u32().ok_or(HandshakeError::Truncated)?;
    }
    Ok(XteaKey::new(words))
}

fn read_credential<'a>(reader: &mut PacketReader<'a>) -> Result<&'a [u8], HandshakeError> {
    reader
        .read_string(Credential::CAPACITY + 1)
        .ok_or(HandshakeError::Truncated)
}

// =============================================================================
// CLIENT SIDE
// =============================================================================

/// Builds a login handshake the way the client does, for tests and tools.
///
/// Returns the 149-byte body (outer length not included).
///
/// # Errors
///
/// [`CryptoError`] if RSA encoding fails, which only happens with a key wider
/// than 1024 bits.
pub fn encode_login(
    rsa: &RsaKey,
    version: u16,
    key: &XteaKey,
    account: &[u8],
    password: &[u8],
) -> Result<[u8; LOGIN_HANDSHAKE_LEN], CryptoError> {
    let mut plaintext = [0u8; RSA_PLAINTEXT_LEN];
    let mut writer = PacketWriter::new(&mut plaintext);
    write_key(&mut writer, key);
    writer.write_string(account);
    writer.write_string(password);

    let mut body = [0u8; LOGIN_HANDSHAKE_LEN];
    body[4] = LOGIN_HANDSHAKE_TAG;
    body[5..7].copy_from_slice(&2u16.to_le_bytes());
    body[7..9].copy_from_slice(&version.to_le_bytes());
    encrypt_block(&mut body[LOGIN_RSA_OFFSET..], &plaintext, rsa)?;
    let checksum = adler32(&body[4..]);
    body[..4].copy_from_slice(&checksum.to_le_bytes());
    Ok(body)
}

/// Builds a game handshake the way the client does, for tests and tools.
///
/// Returns the 137-byte body (outer length not included).
///
/// # Errors
///
/// As [`encode_login`].
pub fn encode_game(
    rsa: &RsaKey,
    version: u16,
    key: &XteaKey,
    account: &[u8],
    character: &[u8],
    password: &[u8],
) -> Result<[u8; GAME_HANDSHAKE_LEN], CryptoError> {
    let mut plaintext = [0u8; RSA_PLAINTEXT_LEN];
    let mut writer = PacketWriter::new(&mut plaintext);
    write_key(&mut writer, key);
    writer.write_u8(0);
    writer.write_string(account);
    writer.write_string(character);
    writer.write_string(password);

    let mut body = [0u8; GAME_HANDSHAKE_LEN];
    body[4] = GAME_HANDSHAKE_TAG;
    body[5..7].copy_from_slice(&2u16.to_le_bytes());
    body[7..9].copy_from_slice(&version.to_le_bytes());
    encrypt_block(&mut body[GAME_RSA_OFFSET..], &plaintext, rsa)?;
    let checksum = adler32(&body[4..]);
    body[..4].copy_from_slice(&checksum.to_le_bytes());
    Ok(body)
}

fn write_key(writer: &mut PacketWriter<'_>, key: &XteaKey) {
    for word in key.words() {
        writer.write_u32(word);
    }
}

/// Encrypts 127 plaintext bytes into a right-aligned 128-byte block.
fn encrypt_block(
    block: &mut [u8],
    plaintext: &[u8; RSA_PLAINTEXT_LEN],
    rsa: &RsaKey,
) -> Result<(), CryptoError> {
    let mut scratch = [0u8; RSA_BLOCK_LEN];
    scratch[1..].copy_from_slice(plaintext);
    let len = rsa.encode(&mut scratch, RSA_BLOCK_LEN)?;

    block.fill(0);
    block[RSA_BLOCK_LEN - len..RSA_BLOCK_LEN].copy_from_slice(&scratch[..len]);
    Ok(())
}
