//! # Ashgate Crypto
//!
//! The three primitives the wire protocol depends on:
//! - [`Adler32`] - rolling checksum guarding every frame
//! - [`RsaKey`] - textbook RSA, used once per connection to carry the session key
//! - [`XteaKey`] - 64-bit block cipher for everything after the handshake
//!
//! None of these are meant to be secure by modern standards. They are
//! bit-exact with a fixed legacy client.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod checksum;
pub mod error;
pub mod rsa;
pub mod xtea;

pub use checksum::{adler32, Adler32};
pub use error::{CryptoError, CryptoResult};
pub use rsa::RsaKey;
pub use xtea::XteaKey;
