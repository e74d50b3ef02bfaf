//! # Frame Codec
//!
//! Turns payloads into wire frames and back.
//!
//! ```text
//! outer_len:u16 | checksum:u32 | XTEA{ payload_len:u16 | payload | 0x33* }
//! ```
//!
//! `outer_len` counts everything after itself. The checksum is Adler-32 over
//! the encrypted region, computed after encryption. The multiplexer strips
//! `outer_len` before [`unwrap`] sees a frame.

use ashgate_crypto::{adler32, XteaKey};

use crate::error::FrameError;

/// Bytes in front of the payload: outer length, checksum, payload length.
pub const FRAME_HEADER_LEN: usize = 8;

/// Filler appended until the encrypted region is block aligned.
pub const PADDING_BYTE: u8 = 0x33;

/// Checksum plus one cipher block.
const MIN_BODY_LEN: usize = 12;

/// Where the encrypted region starts in a sealed frame.
const REGION_OFFSET: usize = 6;

/// Returns the full on-wire length of a frame carrying `payload_len` bytes.
#[inline]
#[must_use]
pub const fn sealed_len(payload_len: usize) -> usize {
    REGION_OFFSET + (2 + payload_len).next_multiple_of(8)
}

/// Seals a payload already written at `buf[8..8 + payload_len]`.
///
/// Writes the length fields, padding and checksum around it and encrypts in
/// place. Returns the total frame length, starting at `buf[0]`.
///
/// # Errors
///
/// [`FrameError::EmptyPayload`] for a zero-length payload,
/// [`FrameError::BufferTooSmall`] if the padded frame does not fit `buf`.
pub fn seal(buf: &mut [u8], payload_len: usize, key: &XteaKey) -> Result<usize, FrameError> {
    if payload_len == 0 {
        return Err(FrameError::EmptyPayload);
    }

    let total = sealed_len(payload_len);
    let too_small = FrameError::BufferTooSmall {
        needed: total,
        capacity: buf.len(),
    };
    if total > buf.len() {
        return Err(too_small);
    }
    let outer_len = u16::try_from(total - 2).map_err(|_| too_small)?;
    let inner_len = u16::try_from(payload_len).map_err(|_| too_small)?;

    buf[REGION_OFFSET..FRAME_HEADER_LEN].copy_from_slice(&inner_len.to_le_bytes());
    buf[FRAME_HEADER_LEN + payload_len..total].fill(PADDING_BYTE);

    let region = &mut buf[REGION_OFFSET..total];
    key.encrypt(region)
        .map_err(|_| FrameError::Misaligned(region.len()))?;
    let checksum = adler32(region);

    buf[2..REGION_OFFSET].copy_from_slice(&checksum.to_le_bytes());
    buf[..2].copy_from_slice(&outer_len.to_le_bytes());

    Ok(total)
}

/// Copies `payload` into `out` and seals it there.
///
/// # Errors
///
/// Same as [`seal`].
pub fn wrap(payload: &[u8], key: &XteaKey, out: &mut [u8]) -> Result<usize, FrameError> {
    let needed = sealed_len(payload.len());
    let capacity = out.len();
    let target = out
        .get_mut(FRAME_HEADER_LEN..FRAME_HEADER_LEN + payload.len())
        .ok_or(FrameError::BufferTooSmall { needed, capacity })?;
    target.copy_from_slice(payload);
    seal(out, payload.len(), key)
}

/// Validates and decrypts a frame body in place, returning its payload.
///
/// `body` is everything after the outer length field.
///
/// # Errors
///
/// Any [`FrameError`] other than the sealing ones. The caller must drop the
/// connection; a failed body is left partially decrypted.
pub fn unwrap<'a>(body: &'a mut [u8], key: &XteaKey) -> Result<&'a mut [u8], FrameError> {
    if body.len() < MIN_BODY_LEN {
        return Err(FrameError::TooShort(body.len()));
    }

    let (checksum, region) = body.split_at_mut(4);
    if region.len() % 8 != 0 {
        return Err(FrameError::Misaligned(region.len()));
    }

    let expected = u32::from_le_bytes([checksum[0], checksum[1], checksum[2], checksum[3]]);
    let actual = adler32(region);
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    key.decrypt(region)
        .map_err(|_| FrameError::Misaligned(region.len()))?;

    let declared = usize::from(u16::from_le_bytes([region[0], region[1]]));
    let available = region.len() - 2;
    if declared > available {
        return Err(FrameError::PayloadOverflow {
            declared,
            available,
        });
    }

    Ok(&mut region[2..2 + declared])
}
