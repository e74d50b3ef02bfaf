//! # Crypto Error Types

use thiserror::Error;

/// Errors reported by the crypto primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Block cipher input is not a whole number of 8-byte blocks.
    #[error("length {0} is not a multiple of 8")]
    UnalignedLength(usize),

    /// The exact RSA result does not fit in the caller's buffer.
    #[error("output needs {needed} bytes, buffer holds {capacity}")]
    OutputTooLarge {
        /// Bytes the result needs.
        needed: usize,
        /// Bytes the buffer holds.
        capacity: usize,
    },

    /// Public exponent is not below, or not coprime to, the Carmichael totient.
    #[error("public exponent is not valid for these primes")]
    InvalidExponent,

    /// A modular inverse needed for the private key does not exist.
    #[error("value has no modular inverse")]
    NotInvertible,

    /// A key component is not a decimal integer.
    #[error("key component is not a decimal integer: {0}")]
    InvalidKeyString(String),

    /// The modulus is wider than the 128-byte handshake block.
    #[error("modulus is {bits} bits, at most 1024 are supported")]
    KeyTooLarge {
        /// Modulus width.
        bits: u64,
    },
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
