//! # Adler-32
//!
//! Streaming checksum over arbitrary byte ranges. Used for frame integrity only.

/// Largest prime below 2^16.
const MODULUS: u32 = 65521;

/// Largest run that cannot overflow the `b` accumulator before reduction.
const MAX_RUN: usize = 5552;

/// A streaming Adler-32 accumulator.
///
/// # Example
///
/// ```rust,ignore
/// let mut sum = Adler32::new();
/// sum.update(b"Wiki");
/// sum.update(b"pedia");
/// assert_eq!(sum.finish(), 0x11E6_0398);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Adler32 {
    /// Starts a fresh checksum (value 1).
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    /// Resumes from a previously finished value.
    #[inline]
    #[must_use]
    pub const fn from_value(value: u32) -> Self {
        Self {
            a: value & 0xFFFF,
            b: value >> 16,
        }
    }

    /// Feeds more bytes into the checksum.
    ///
    /// Runs of 16 bytes are summed four bytes per step; the tail of each run
    /// goes byte by byte.
    pub fn update(&mut self, data: &[u8]) {
        let (mut a, mut b) = (self.a, self.b);

        for run in data.chunks(MAX_RUN) {
            let mut blocks = run.chunks_exact(16);
            for block in &mut blocks {
                for quad in block.chunks_exact(4) {
                    a += u32::from(quad[0]);
                    b += a;
                    a += u32::from(quad[1]);
                    b += a;
                    a += u32::from(quad[2]);
                    b += a;
                    a += u32::from(quad[3]);
                    b += a;
                }
            }
            for &byte in blocks.remainder() {
                a += u32::from(byte);
                b += a;
            }
            a %= MODULUS;
            b %= MODULUS;
        }

        self.a = a;
        self.b = b;
    }

    /// Returns the checksum of everything fed so far.
    #[inline]
    #[must_use]
    pub const fn finish(&self) -> u32 {
        self.a | (self.b << 16)
    }
}

/// One-shot Adler-32 of `data`.
#[inline]
#[must_use]
pub fn adler32(data: &[u8]) -> u32 {
    let mut sum = Adler32::new();
    sum.update(data);
    sum.finish()
}
