//! # Arena Allocator
//!
//! A reserve-then-commit bump allocator for memory that lives as long as the process.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::{Deref, DerefMut};

use bytes::{Buf, BytesMut};

use crate::error::{ArenaError, ArenaResult};

/// Commit granules are rounded up to this size.
const PAGE_SIZE: usize = 4096;

/// A bump-pointer arena over a single up-front reservation.
///
/// The whole range is reserved when the arena is created. Physical memory is
/// committed (zero-filled) one granule at a time, only when the allocation
/// cursor crosses the commit frontier. Blocks are never given back.
///
/// Invariant: `used <= committed <= reserved`.
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. Share it with `Rc` inside one event loop.
///
/// # Example
///
/// ```rust,ignore
/// let arena = Arena::reserve(64 << 20, 1 << 20)?; // 64MB range, 1MB granules
///
/// // Fast allocations, zeroed
/// let buffer = arena.alloc(2048, 8);
/// assert!(buffer.iter().all(|&b| b == 0));
/// ```
pub struct Arena {
    /// Committed-but-unallocated bytes; capacity is the rest of the reservation.
    tail: RefCell<BytesMut>,
    /// Total reserved bytes.
    reserved: usize,
    /// Commit increment.
    granule: usize,
    /// Bytes committed so far.
    committed: Cell<usize>,
    /// Bytes handed out so far, padding included.
    used: Cell<usize>,
}

impl Arena {
    /// Reserves `reserve_bytes` and prepares to commit in `granule_bytes` steps.
    ///
    /// The granule is rounded up to the page size and the reservation up to a
    /// whole number of granules. Nothing is committed yet.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidReservation`] if either size is zero.
    pub fn reserve(reserve_bytes: usize, granule_bytes: usize) -> ArenaResult<Self> {
        if reserve_bytes == 0 || granule_bytes == 0 {
            return Err(ArenaError::InvalidReservation {
                reserve: reserve_bytes,
                granule: granule_bytes,
            });
        }

        let granule = align_up(granule_bytes, PAGE_SIZE);
        let reserved = align_up(reserve_bytes, granule);

        tracing::debug!(reserved, granule, "arena reserved");

        Ok(Self {
            tail: RefCell::new(BytesMut::with_capacity(reserved)),
            reserved,
            granule,
            committed: Cell::new(0),
            used: Cell::new(0),
        })
    }

    /// Returns the total reserved size in bytes.
    #[inline]
    #[must_use]
    pub const fn reserved(&self) -> usize {
        self.reserved
    }

    /// Returns the commit granule in bytes.
    #[inline]
    #[must_use]
    pub const fn granule(&self) -> usize {
        self.granule
    }

    /// Returns how many bytes have been committed.
    #[inline]
    #[must_use]
    pub fn committed(&self) -> usize {
        self.committed.get()
    }

    /// Returns how many bytes have been handed out, alignment padding included.
    #[inline]
    #[must_use]
    pub fn used(&self) -> usize {
        self.used.get()
    }

    /// Returns the bytes left in the reservation.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.reserved - self.used()
    }

    /// Carves a zeroed block of `size` bytes aligned to `align`.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidAlignment`] for a non power-of-two
    /// alignment and [`ArenaError::Exhausted`] if the block would cross the
    /// end of the reservation.
    pub fn try_alloc(&self, size: usize, align: usize) -> ArenaResult<ArenaBlock> {
        if !align.is_power_of_two() {
            return Err(ArenaError::InvalidAlignment(align));
        }

        let mut tail = self.tail.borrow_mut();

        let address = tail.as_ptr() as usize;
        let padding = align_up(address, align) - address;
        let needed = padding
            .checked_add(size)
            .filter(|&needed| needed <= tail.capacity())
            .ok_or(ArenaError::Exhausted {
                requested: size.saturating_add(padding),
                remaining: tail.capacity(),
            })?;

        while tail.len() < needed {
            let step = self.granule.min(tail.capacity() - tail.len());
            let new_len = tail.len() + step;
            // Within capacity: fills in place, never reallocates.
            tail.resize(new_len, 0);
            self.committed.set(self.committed.get() + step);
            tracing::trace!(committed = self.committed.get(), "arena granule committed");
        }

        tail.advance(padding);
        let bytes = tail.split_to(size);
        self.used.set(self.used.get() + needed);

        Ok(ArenaBlock { bytes })
    }

    /// Carves a zeroed block, aborting the process if the arena is exhausted.
    ///
    /// Capacity is sized from configured connection limits, so running out
    /// means the configuration is wrong. There is nothing to recover.
    #[must_use]
    pub fn alloc(&self, size: usize, align: usize) -> ArenaBlock {
        match self.try_alloc(size, align) {
            Ok(block) => block,
            Err(err) => {
                tracing::error!(%err, used = self.used(), reserved = self.reserved, "arena overflow");
                std::process::abort();
            }
        }
    }

    /// Carves room for `count` elements of `element_size` bytes.
    ///
    /// Arrays of more than one element get at least pointer alignment.
    ///
    /// # Errors
    ///
    /// Same as [`Arena::try_alloc`]; an overflowing total size is reported as
    /// [`ArenaError::Exhausted`].
    pub fn try_alloc_array(
        &self,
        count: usize,
        element_size: usize,
        align: usize,
    ) -> ArenaResult<ArenaBlock> {
        let size = count.checked_mul(element_size).ok_or(ArenaError::Exhausted {
            requested: usize::MAX,
            remaining: self.remaining(),
        })?;
        let align = if count > 1 {
            align.max(std::mem::align_of::<usize>())
        } else {
            align
        };
        self.try_alloc(size, align)
    }

    /// Array form of [`Arena::alloc`]; aborts on exhaustion.
    #[must_use]
    pub fn alloc_array(&self, count: usize, element_size: usize, align: usize) -> ArenaBlock {
        match self.try_alloc_array(count, element_size, align) {
            Ok(block) => block,
            Err(err) => {
                tracing::error!(%err, count, element_size, "arena overflow");
                std::process::abort();
            }
        }
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("reserved", &self.reserved)
            .field("granule", &self.granule)
            .field("committed", &self.committed.get())
            .field("used", &self.used.get())
            .finish()
    }
}

/// A fixed-size block carved from an [`Arena`].
///
/// Derefs to a byte slice. It cannot grow, so it never leaves the reservation.
pub struct ArenaBlock {
    bytes: BytesMut,
}

impl ArenaBlock {
    /// Overwrites the whole block with zeroes.
    #[inline]
    pub fn zero(&mut self) {
        self.bytes.fill(0);
    }
}

impl Deref for ArenaBlock {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for ArenaBlock {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl fmt::Debug for ArenaBlock {
    // Contents may hold credentials.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaBlock").field("len", &self.bytes.len()).finish()
    }
}

#[inline]
const fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_allocation() {
        let arena = Arena::reserve(64 * 1024, 4096).unwrap();
        let block = arena.alloc(100, 1);
        assert_eq!(block.len(), 100);
        assert!(block.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_arena_commits_in_granules() {
        let arena = Arena::reserve(64 * 1024, 4096).unwrap();
        assert_eq!(arena.committed(), 0);

        let _first = arena.alloc(10, 1);
        assert_eq!(arena.committed(), 4096);

        // Crosses the frontier: exactly one more granule.
        let _second = arena.alloc(4096, 1);
        assert_eq!(arena.committed(), 8192);
        assert!(arena.used() <= arena.committed());
        assert!(arena.committed() <= arena.reserved());
    }

    #[test]
    fn test_arena_alignment() {
        let arena = Arena::reserve(64 * 1024, 4096).unwrap();
        let _odd = arena.alloc(3, 1);
        let aligned = arena.alloc(16, 64);
        assert_eq!(aligned.as_ptr() as usize % 64, 0);
    }

    #[test]
    fn test_arena_blocks_do_not_overlap() {
        let arena = Arena::reserve(64 * 1024, 4096).unwrap();
        let mut a = arena.alloc(32, 8);
        let b = arena.alloc(32, 8);
        a.fill(0xAB);
        assert!(b.iter().all(|&byte| byte == 0));
        let a_end = a.as_ptr() as usize + a.len();
        assert!(a_end <= b.as_ptr() as usize);
    }

    #[test]
    fn test_arena_exhaustion() {
        let arena = Arena::reserve(4096, 4096).unwrap();
        let _all = arena.try_alloc(4000, 1).unwrap();
        let err = arena.try_alloc(200, 1).unwrap_err();
        assert!(matches!(err, ArenaError::Exhausted { .. }));
    }

    #[test]
    fn test_arena_invalid_arguments() {
        assert!(Arena::reserve(0, 4096).is_err());
        assert!(Arena::reserve(4096, 0).is_err());

        let arena = Arena::reserve(4096, 4096).unwrap();
        assert_eq!(arena.try_alloc(8, 3).unwrap_err(), ArenaError::InvalidAlignment(3));
    }

    #[test]
    fn test_arena_array_overflow() {
        let arena = Arena::reserve(4096, 4096).unwrap();
        assert!(arena.try_alloc_array(usize::MAX, 2, 1).is_err());

        let array = arena.try_alloc_array(16, 4, 4).unwrap();
        assert_eq!(array.len(), 64);
        assert_eq!(array.as_ptr() as usize % std::mem::align_of::<usize>(), 0);
    }

    #[test]
    fn test_block_zero() {
        let arena = Arena::reserve(4096, 4096).unwrap();
        let mut block = arena.alloc(16, 1);
        block.fill(7);
        block.zero();
        assert!(block.iter().all(|&b| b == 0));
    }
}
