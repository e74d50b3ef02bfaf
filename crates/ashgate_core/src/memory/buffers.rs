//! # Buffer Pool
//!
//! Recycles equally sized arena blocks.

use std::rc::Rc;

use crate::memory::arena::{Arena, ArenaBlock};

/// A freelist of arena blocks that all have the same size.
///
/// Blocks come from the arena the first time and are recycled through the
/// freelist afterwards, so the arena only grows to the high-water mark.
#[derive(Debug)]
pub struct BufferPool {
    arena: Rc<Arena>,
    block_size: usize,
    free: Vec<ArenaBlock>,
    allocated: usize,
}

impl BufferPool {
    /// Creates an empty pool that carves `block_size` blocks from `arena`.
    #[must_use]
    pub fn new(arena: Rc<Arena>, block_size: usize) -> Self {
        Self {
            arena,
            block_size,
            free: Vec::new(),
            allocated: 0,
        }
    }

    /// Returns the size of each block.
    #[inline]
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns how many blocks have ever been carved from the arena.
    #[inline]
    #[must_use]
    pub const fn allocated(&self) -> usize {
        self.allocated
    }

    /// Returns how many blocks sit in the freelist.
    #[inline]
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Takes a block, reusing a released one when possible.
    ///
    /// Recycled blocks are handed out as they were released; callers that
    /// need zeroes call [`ArenaBlock::zero`].
    pub fn acquire(&mut self) -> ArenaBlock {
        if let Some(block) = self.free.pop() {
            return block;
        }
        self.allocated += 1;
        self.arena.alloc(self.block_size, 8)
    }

    /// Puts a block back on the freelist.
    pub fn release(&mut self, block: ArenaBlock) {
        debug_assert_eq!(block.len(), self.block_size);
        self.free.push(block);
    }
}
