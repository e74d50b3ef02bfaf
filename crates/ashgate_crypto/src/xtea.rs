//! # XTEA
//!
//! 64-bit block cipher with a 128-bit key, 32 rounds, little-endian words.
//! Operates on whole 8-byte blocks only; callers pad.

use crate::error::{CryptoError, CryptoResult};

const DELTA: u32 = 0x9E37_79B9;
const ROUNDS: u32 = 32;
/// `DELTA * ROUNDS`, where decryption starts.
const DECRYPT_SUM: u32 = 0xC6EF_3720;

/// Block size in bytes.
pub const BLOCK_LEN: usize = 8;

/// A session key: four 32-bit words.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct XteaKey(pub [u32; 4]);

impl XteaKey {
    /// Wraps four key words.
    #[inline]
    #[must_use]
    pub const fn new(words: [u32; 4]) -> Self {
        Self(words)
    }

    /// Reads a key stored as four little-endian words.
    #[must_use]
    pub fn from_le_bytes(bytes: [u8; 16]) -> Self {
        let word = |i: usize| {
            u32::from_le_bytes([bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]])
        };
        Self([word(0), word(1), word(2), word(3)])
    }

    /// Returns the key words.
    #[inline]
    #[must_use]
    pub const fn words(&self) -> [u32; 4] {
        self.0
    }

    /// Encrypts `data` in place.
    ///
    /// # Errors
    ///
    /// [`CryptoError::UnalignedLength`] if `data.len()` is not a multiple of 8.
    pub fn encrypt(&self, data: &mut [u8]) -> CryptoResult<()> {
        check_aligned(data)?;
        let k = &self.0;

        for block in data.chunks_exact_mut(BLOCK_LEN) {
            let (mut v0, mut v1) = load(block);
            let mut sum = 0u32;
            for _ in 0..ROUNDS {
                v0 = v0.wrapping_add(
                    (((v1 << 4) ^ (v1 >> 5)).wrapping_add(v1))
                        ^ sum.wrapping_add(k[(sum & 3) as usize]),
                );
                sum = sum.wrapping_add(DELTA);
                v1 = v1.wrapping_add(
                    (((v0 << 4) ^ (v0 >> 5)).wrapping_add(v0))
                        ^ sum.wrapping_add(k[((sum >> 11) & 3) as usize]),
                );
            }
            store(block, v0, v1);
        }
        Ok(())
    }

    /// Decrypts `data` in place.
    ///
    /// # Errors
    ///
    /// [`CryptoError::UnalignedLength`] if `data.len()` is not a multiple of 8.
    pub fn decrypt(&self, data: &mut [u8]) -> CryptoResult<()> {
        check_aligned(data)?;
        let k = &self.0;

        for block in data.chunks_exact_mut(BLOCK_LEN) {
            let (mut v0, mut v1) = load(block);
            let mut sum = DECRYPT_SUM;
            for _ in 0..ROUNDS {
                v1 = v1.wrapping_sub(
                    (((v0 << 4) ^ (v0 >> 5)).wrapping_add(v0))
                        ^ sum.wrapping_add(k[((sum >> 11) & 3) as usize]),
                );
                sum = sum.wrapping_sub(DELTA);
                v0 = v0.wrapping_sub(
                    (((v1 << 4) ^ (v1 >> 5)).wrapping_add(v1))
                        ^ sum.wrapping_add(k[(sum & 3) as usize]),
                );
            }
            store(block, v0, v1);
        }
        Ok(())
    }
}

impl std::fmt::Debug for XteaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("XteaKey(..)")
    }
}

#[inline]
fn check_aligned(data: &[u8]) -> CryptoResult<()> {
    if data.len() % BLOCK_LEN == 0 {
        Ok(())
    } else {
        Err(CryptoError::UnalignedLength(data.len()))
    }
}

#[inline]
fn load(block: &[u8]) -> (u32, u32) {
    (
        u32::from_le_bytes([block[0], block[1], block[2], block[3]]),
        u32::from_le_bytes([block[4], block[5], block[6], block[7]]),
    )
}

#[inline]
fn store(block: &mut [u8], v0: u32, v1: u32) {
    block[..4].copy_from_slice(&v0.to_le_bytes());
    block[4..8].copy_from_slice(&v1.to_le_bytes());
}
