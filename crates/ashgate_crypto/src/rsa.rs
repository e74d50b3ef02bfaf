//! # RSA
//!
//! Textbook RSA over provisioned primes. The client encrypts one block per
//! connection with the public key; the server decrypts it with CRT.

use std::fmt;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::error::{CryptoError, CryptoResult};

/// Widest modulus the 128-byte handshake block can carry.
pub const MAX_MODULUS_BITS: u64 = 1024;

/// The key every service uses unless the configuration provides one.
const BUILTIN_P: &str = concat!(
    "142996239624163995200701773828988955507954033454661532174705160829",
    "347375827760388829672133862046006741453928458538592179906264509724",
    "52084065728686565928113",
);
const BUILTIN_Q: &str = concat!(
    "763097919597040472189120184779200212553540129277912393720744757459",
    "669278851364717923533552930725135057072840737370556470887176203301",
    "7096809910315212884101",
);
const BUILTIN_E: &str = "65537";

/// An RSA key pair with precomputed CRT coefficients.
///
/// Immutable once built. Share one instance between services with `Rc`.
#[derive(Clone)]
pub struct RsaKey {
    p: BigUint,
    q: BigUint,
    n: BigUint,
    e: BigUint,
    /// d mod (p - 1)
    dp: BigUint,
    /// d mod (q - 1)
    dq: BigUint,
    /// q^-1 mod p
    qi: BigUint,
}

impl RsaKey {
    /// Builds a key from its primes and public exponent.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::InvalidExponent`] if `e` is not below and coprime to
    ///   `lcm(p - 1, q - 1)`
    /// - [`CryptoError::KeyTooLarge`] if `p * q` is wider than 1024 bits
    /// - [`CryptoError::NotInvertible`] if `q` has no inverse mod `p`
    pub fn from_primes(p: BigUint, q: BigUint, e: BigUint) -> CryptoResult<Self> {
        let one = BigUint::one();
        if p <= one || q <= one {
            return Err(CryptoError::NotInvertible);
        }

        let n = &p * &q;
        if n.bits() > MAX_MODULUS_BITS {
            return Err(CryptoError::KeyTooLarge { bits: n.bits() });
        }

        let p1 = &p - &one;
        let q1 = &q - &one;
        let lambda = p1.lcm(&q1);

        if e >= lambda || e.is_zero() || !e.gcd(&lambda).is_one() {
            return Err(CryptoError::InvalidExponent);
        }

        let d = e.modinv(&lambda).ok_or(CryptoError::NotInvertible)?;
        let dp = &d % &p1;
        let dq = &d % &q1;
        let qi = q.modinv(&p).ok_or(CryptoError::NotInvertible)?;

        Ok(Self {
            p,
            q,
            n,
            e,
            dp,
            dq,
            qi,
        })
    }

    /// Builds a key from decimal strings.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InvalidKeyString`] for a malformed number, otherwise as
    /// [`RsaKey::from_primes`].
    pub fn from_decimal(p: &str, q: &str, e: &str) -> CryptoResult<Self> {
        Self::from_primes(parse_decimal(p)?, parse_decimal(q)?, parse_decimal(e)?)
    }

    /// The key compiled into the server, matching the stock client.
    ///
    /// # Errors
    ///
    /// Never in practice; the constants are known to be valid.
    pub fn builtin() -> CryptoResult<Self> {
        Self::from_decimal(BUILTIN_P, BUILTIN_Q, BUILTIN_E)
    }

    /// Returns the modulus width in bits.
    #[must_use]
    pub fn modulus_bits(&self) -> u64 {
        self.n.bits()
    }

    /// Returns the modulus width rounded up to whole bytes.
    #[must_use]
    pub fn modulus_len(&self) -> usize {
        // At most 128, see MAX_MODULUS_BITS.
        self.n.bits().div_ceil(8) as usize
    }

    /// Encrypts `buf[..len]` in place with the public exponent.
    ///
    /// The input is read as a big-endian integer. The result is written to
    /// the front of `buf` in minimal big-endian form and its length returned.
    ///
    /// # Errors
    ///
    /// [`CryptoError::OutputTooLarge`] if the result needs more than
    /// `buf.len()` bytes. `buf` is left untouched in that case.
    pub fn encode(&self, buf: &mut [u8], len: usize) -> CryptoResult<usize> {
        let m = import(buf, len);
        let c = m.modpow(&self.e, &self.n);
        export(&c, buf)
    }

    /// Decrypts `buf[..len]` in place using the CRT form of the private key.
    ///
    /// Same conventions as [`RsaKey::encode`].
    ///
    /// # Errors
    ///
    /// [`CryptoError::OutputTooLarge`] if the result needs more than
    /// `buf.len()` bytes.
    pub fn decode(&self, buf: &mut [u8], len: usize) -> CryptoResult<usize> {
        let c = import(buf, len);

        let m1 = c.modpow(&self.dp, &self.p);
        let m2 = c.modpow(&self.dq, &self.q);

        // h = qi * (m1 - m2) mod p, kept non-negative.
        let m2_mod_p = &m2 % &self.p;
        let h = ((&m1 + &self.p - m2_mod_p) * &self.qi) % &self.p;
        let m = m2 + h * &self.q;

        export(&m, buf)
    }
}

impl fmt::Debug for RsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKey")
            .field("bits", &self.n.bits())
            .field("e", &self.e)
            .finish_non_exhaustive()
    }
}

fn parse_decimal(text: &str) -> CryptoResult<BigUint> {
    let trimmed = text.trim();
    BigUint::parse_bytes(trimmed.as_bytes(), 10)
        .ok_or_else(|| CryptoError::InvalidKeyString(trimmed.chars().take(16).collect()))
}

fn import(buf: &[u8], len: usize) -> BigUint {
    let len = len.min(buf.len());
    BigUint::from_bytes_be(&buf[..len])
}

fn export(value: &BigUint, buf: &mut [u8]) -> CryptoResult<usize> {
    if value.is_zero() {
        return Ok(0);
    }
    let bytes = value.to_bytes_be();
    let capacity = buf.len();
    let out = buf.get_mut(..bytes.len()).ok_or(CryptoError::OutputTooLarge {
        needed: bytes.len(),
        capacity,
    })?;
    out.copy_from_slice(&bytes);
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_key() -> RsaKey {
        // n = 3233, lambda = 780
        RsaKey::from_decimal("61", "53", "17").unwrap()
    }

    #[test]
    fn test_builtin_key() {
        let key = RsaKey::builtin().unwrap();
        assert_eq!(key.modulus_bits(), 1024);
        assert_eq!(key.modulus_len(), 128);
    }

    #[test]
    fn test_small_key_round_trip() {
        let key = small_key();
        let mut buf = [0u8; 2];
        buf[..2].copy_from_slice(&65u16.to_be_bytes());

        let len = key.encode(&mut buf, 2).unwrap();
        assert_eq!(u16::from_be_bytes([buf[0], buf[1]]) as usize, 2790);
        assert_eq!(len, 2);

        let len = key.decode(&mut buf, len).unwrap();
        assert_eq!(len, 1);
        assert_eq!(buf[0], 65);
    }

    #[test]
    fn test_builtin_round_trip() {
        let key = RsaKey::builtin().unwrap();
        let message: Vec<u8> = (1..=127u8).collect();

        let mut buf = [0u8; 128];
        buf[..127].copy_from_slice(&message);

        let encoded = key.encode(&mut buf, 127).unwrap();
        assert!(encoded <= 128);
        let decoded = key.decode(&mut buf, encoded).unwrap();
        assert_eq!(decoded, 127);
        assert_eq!(&buf[..127], &message[..]);
    }

    #[test]
    fn test_output_too_large() {
        let key = RsaKey::builtin().unwrap();
        let mut buf = [0xFFu8; 4];
        let err = key.encode(&mut buf, 4).unwrap_err();
        assert!(matches!(err, CryptoError::OutputTooLarge { capacity: 4, .. }));
        assert_eq!(buf, [0xFF; 4]);
    }

    #[test]
    fn test_zero_encodes_to_nothing() {
        let key = small_key();
        let mut buf = [0u8; 4];
        assert_eq!(key.encode(&mut buf, 4).unwrap(), 0);
    }

    #[test]
    fn test_invalid_exponent() {
        // lambda(61 * 53) = 780, 5 divides it.
        assert_eq!(
            RsaKey::from_decimal("61", "53", "5").unwrap_err(),
            CryptoError::InvalidExponent
        );
        assert_eq!(
            RsaKey::from_decimal("61", "53", "781").unwrap_err(),
            CryptoError::InvalidExponent
        );
    }

    #[test]
    fn test_invalid_key_string() {
        assert!(matches!(
            RsaKey::from_decimal("61x", "53", "17"),
            Err(CryptoError::InvalidKeyString(_))
        ));
    }

    #[test]
    fn test_debug_hides_private_parts() {
        let text = format!("{:?}", small_key());
        assert!(!text.contains("dp"));
    }
}
