//! # Packet Serialization
//!
//! Bounds-checked cursors over wire buffers.
//!
//! ## Design
//!
//! - Little-endian integers, `u16`-length-prefixed strings
//! - Strings are read or written whole, never partially
//! - Writers never allocate: they fill a borrowed buffer and remember overflow

/// Packet reader - reads little-endian fields from a borrowed buffer.
#[derive(Debug)]
pub struct PacketReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    /// Creates a new reader at the start of `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Returns the current read offset.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Reads `len` raw bytes.
    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.position.checked_add(len)?;
        let bytes = self.buffer.get(self.position..end)?;
        self.position = end;
        Some(bytes)
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Option<u8> {
        self.read_bytes(1).map(|b| b[0])
    }

    /// Reads a u16 in little-endian format.
    #[inline]
    pub fn read_u16(&mut self) -> Option<u16> {
        self.read_bytes(2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    /// Reads a u32 in little-endian format.
    #[inline]
    pub fn read_u32(&mut self) -> Option<u32> {
        self.read_bytes(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a length-prefixed string of fewer than `limit` bytes.
    ///
    /// A string of `limit` bytes or more is skipped and read as empty.
    /// Returns `None` only if the buffer ends before the string does.
    pub fn read_string(&mut self, limit: usize) -> Option<&'a [u8]> {
        let len = usize::from(self.read_u16()?);
        let bytes = self.read_bytes(len)?;
        if len < limit {
            Some(bytes)
        } else {
            Some(&bytes[..0])
        }
    }

    /// Skips `len` bytes.
    #[inline]
    pub fn skip(&mut self, len: usize) -> Option<()> {
        self.read_bytes(len).map(|_| ())
    }
}

/// Packet writer - writes little-endian fields into a borrowed buffer.
///
/// Overflow is sticky: once a write does not fit, every later write is
/// dropped and [`PacketWriter::is_ok`] stays false. Build the whole message,
/// then check once.
#[derive(Debug)]
pub struct PacketWriter<'a> {
    buffer: &'a mut [u8],
    position: usize,
    overflow: bool,
}

impl<'a> PacketWriter<'a> {
    /// Creates a writer at the start of `buffer`.
    #[must_use]
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self::at(buffer, 0)
    }

    /// Creates a writer that starts at `position`, leaving room for a header.
    #[must_use]
    pub fn at(buffer: &'a mut [u8], position: usize) -> Self {
        let overflow = position > buffer.len();
        Self {
            position: position.min(buffer.len()),
            buffer,
            overflow,
        }
    }

    /// Returns the write offset.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Returns the bytes left before the end of the buffer.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// Returns true if every write so far fit.
    #[inline]
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        !self.overflow
    }

    /// Returns true if `len` more bytes would fit.
    #[inline]
    #[must_use]
    pub fn can_write(&self, len: usize) -> bool {
        !self.overflow && self.remaining() >= len
    }

    /// Marks the message as unbuildable; every later write is dropped.
    #[inline]
    pub fn poison(&mut self) {
        self.overflow = true;
    }

    /// Writes raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if !self.can_write(bytes.len()) {
            self.overflow = true;
            return;
        }
        self.buffer[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    /// Writes a u16 in little-endian format.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Writes a u32 in little-endian format.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Writes a length-prefixed string.
    pub fn write_string(&mut self, value: &[u8]) {
        match u16::try_from(value.len()) {
            Ok(len) if self.can_write(2 + value.len()) => {
                self.write_u16(len);
                self.write_bytes(value);
            }
            _ => self.overflow = true,
        }
    }
}

/// A string held inline in a fixed array, never on the heap.
///
/// Holds at most `N - 1` bytes. Cleared with zeroes so credentials do not
/// outlive the session that read them.
#[derive(Clone, PartialEq, Eq)]
pub struct FixedString<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> FixedString<N> {
    /// Longest string this type can hold.
    pub const CAPACITY: usize = N - 1;

    /// Creates an empty string.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: [0; N],
            len: 0,
        }
    }

    /// Replaces the contents; anything longer than [`Self::CAPACITY`] becomes empty.
    pub fn set(&mut self, value: &[u8]) {
        self.clear();
        if value.len() <= Self::CAPACITY {
            self.bytes[..value.len()].copy_from_slice(value);
            self.len = value.len();
        }
    }

    /// Zeroes the whole backing array.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
        self.len = 0;
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Returns the contents if they are valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }

    /// Returns true if empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the length in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }
}

impl<const N: usize> Default for FixedString<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> std::fmt::Debug for FixedString<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // May hold a password.
        f.debug_struct("FixedString").field("len", &self.len).finish()
    }
}

/// Parses a leading decimal integer the way C `atoi` does.
///
/// Skips leading ASCII whitespace, accepts one sign, stops at the first
/// non-digit. No digits gives 0. Overflow wraps.
#[must_use]
pub fn parse_leading_int(text: &[u8]) -> i32 {
    let mut rest = text;
    while let [first, tail @ ..] = rest {
        if first.is_ascii_whitespace() {
            rest = tail;
        } else {
            break;
        }
    }

    let mut negative = false;
    if let [sign @ (b'+' | b'-'), tail @ ..] = rest {
        negative = *sign == b'-';
        rest = tail;
    }

    let mut value: i32 = 0;
    for &byte in rest.iter().take_while(|b| b.is_ascii_digit()) {
        value = value.wrapping_mul(10).wrapping_add(i32::from(byte - b'0'));
    }

    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}
