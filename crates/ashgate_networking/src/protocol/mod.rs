//! # Protocol
//!
//! Wire formats shared by the login and game services.
//!
//! - [`serialization`]: bounds-checked readers and writers
//! - [`codec`]: frame sealing and unwrapping
//! - [`handshake`]: the RSA-protected first message
//! - [`packets`]: server replies

pub mod codec;
pub mod handshake;
pub mod packets;
pub mod serialization;

pub use codec::{seal, sealed_len, unwrap, wrap, FRAME_HEADER_LEN, PADDING_BYTE};
pub use handshake::{Credential, GameHandshake, LoginHandshake};
pub use serialization::{parse_leading_int, FixedString, PacketReader, PacketWriter};
