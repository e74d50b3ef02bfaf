//! # Outbound Messages
//!
//! Pooled reply buffers and the bounded per-session queue they wait in.

use std::collections::VecDeque;

use ashgate_core::{ArenaBlock, BufferPool};
use ashgate_crypto::XteaKey;

use crate::error::FrameError;
use crate::protocol::codec::{self, FRAME_HEADER_LEN};
use crate::protocol::serialization::PacketWriter;

/// Worst-case padding the sealer appends.
const SEAL_SLACK: usize = 7;

/// One pooled buffer collecting messages for a single frame.
///
/// Payload starts at [`FRAME_HEADER_LEN`]; the header is written by
/// [`OutboundMessage::seal`].
#[derive(Debug)]
pub struct OutboundMessage {
    block: ArenaBlock,
    len: usize,
    overflow: bool,
    sealed: usize,
}

impl OutboundMessage {
    /// Starts an empty message in `block`.
    #[must_use]
    pub fn new(block: ArenaBlock) -> Self {
        Self {
            block,
            len: FRAME_HEADER_LEN,
            overflow: false,
            sealed: 0,
        }
    }

    /// Returns payload bytes written so far.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.len - FRAME_HEADER_LEN
    }

    /// Returns true if `len` more bytes plus sealing padding fit.
    #[must_use]
    pub fn has_room(&self, len: usize) -> bool {
        !self.overflow && self.block.len() - self.len >= len + SEAL_SLACK
    }

    /// Appends whatever `build` writes.
    ///
    /// A write that does not fit poisons the message; sealing it fails.
    pub fn append(&mut self, build: impl FnOnce(&mut PacketWriter<'_>)) {
        let mut writer = PacketWriter::at(&mut self.block, self.len);
        if self.overflow {
            writer.poison();
        }
        build(&mut writer);
        self.overflow |= !writer.is_ok();
        self.len = writer.position();
    }

    /// Frames and encrypts the message in place; returns the frame length.
    ///
    /// # Errors
    ///
    /// [`FrameError::BufferTooSmall`] if an append overflowed or the padding
    /// does not fit, [`FrameError::EmptyPayload`] if nothing was appended.
    pub fn seal(&mut self, key: &XteaKey) -> Result<usize, FrameError> {
        if self.overflow {
            return Err(FrameError::BufferTooSmall {
                needed: self.block.len() + 1,
                capacity: self.block.len(),
            });
        }
        let payload_len = self.payload_len();
        self.sealed = codec::seal(&mut self.block, payload_len, key)?;
        Ok(self.sealed)
    }

    /// Returns the sealed frame.
    #[must_use]
    pub fn frame(&self) -> &[u8] {
        &self.block[..self.sealed]
    }

    /// Gives the buffer back, wiped.
    #[must_use]
    pub fn into_block(mut self) -> ArenaBlock {
        self.block.zero();
        self.block
    }
}

/// FIFO of messages waiting for the socket, bounded per session.
#[derive(Debug)]
pub struct OutboundQueue {
    messages: VecDeque<OutboundMessage>,
    limit: usize,
}

impl OutboundQueue {
    /// Creates an empty queue holding at most `limit` messages.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Returns the number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns a message with room for `size` bytes.
    ///
    /// Reuses the tail when `size > 0` and it has room; otherwise appends a
    /// fresh buffer from `pool`. A `size` of 0 always starts a new frame.
    /// Returns `None` if the queue is full.
    pub fn reserve(&mut self, pool: &mut BufferPool, size: usize) -> Option<&mut OutboundMessage> {
        let reuse_tail = size > 0 && self.messages.back().is_some_and(|tail| tail.has_room(size));
        if !reuse_tail {
            if self.messages.len() >= self.limit {
                return None;
            }
            self.messages.push_back(OutboundMessage::new(pool.acquire()));
        }
        self.messages.back_mut()
    }

    /// Takes the oldest message.
    pub fn pop(&mut self) -> Option<OutboundMessage> {
        self.messages.pop_front()
    }

    /// Returns every queued buffer to `pool`.
    pub fn drain_into(&mut self, pool: &mut BufferPool) {
        for message in self.messages.drain(..) {
            pool.release(message.into_block());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashgate_core::Arena;
    use std::rc::Rc;

    const KEY: XteaKey = XteaKey::new([9, 8, 7, 6]);

    fn pool(block_size: usize) -> BufferPool {
        let arena = Rc::new(Arena::reserve(1 << 20, 4096).unwrap());
        BufferPool::new(arena, block_size)
    }

    #[test]
    fn test_tail_reuse() {
        let mut pool = pool(64);
        let mut queue = OutboundQueue::new(4);

        queue.reserve(&mut pool, 4).unwrap().append(|w| w.write_u32(1));
        queue.reserve(&mut pool, 4).unwrap().append(|w| w.write_u32(2));
        assert_eq!(queue.len(), 1);

        // Size 0 always opens a new frame.
        queue.reserve(&mut pool, 0).unwrap().append(|w| w.write_u8(3));
        assert_eq!(queue.len(), 2);

        let first = queue.pop().unwrap();
        assert_eq!(first.payload_len(), 8);
    }

    #[test]
    fn test_full_tail_opens_new_buffer() {
        let mut pool = pool(32);
        let mut queue = OutboundQueue::new(4);

        queue.reserve(&mut pool, 1).unwrap().append(|w| w.write_bytes(&[0; 16]));
        // 32 - 24 = 8 left, 2 + 7 slack does not fit.
        queue.reserve(&mut pool, 2).unwrap().append(|w| w.write_u16(5));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_queue_limit() {
        let mut pool = pool(64);
        let mut queue = OutboundQueue::new(2);
        assert!(queue.reserve(&mut pool, 0).is_some());
        assert!(queue.reserve(&mut pool, 0).is_some());
        assert!(queue.reserve(&mut pool, 0).is_none());

        queue.drain_into(&mut pool);
        assert!(queue.is_empty());
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_seal_and_overflow() {
        let mut pool = pool(32);
        let mut message = OutboundMessage::new(pool.acquire());
        message.append(|w| w.write_u8(0x28));
        let len = message.seal(&KEY).unwrap();
        assert_eq!(len, codec::sealed_len(1));
        assert_eq!(message.frame().len(), len);

        let mut message = OutboundMessage::new(pool.acquire());
        message.append(|w| w.write_bytes(&[0; 40]));
        assert!(message.seal(&KEY).is_err());

        let message = OutboundMessage::new(pool.acquire());
        let block = message.into_block();
        assert!(block.iter().all(|&b| b == 0));
    }
}
