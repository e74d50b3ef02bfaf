//! # Slot Pool
//!
//! Fixed-capacity index freelist for connection tables.

/// A freelist over `capacity` slot indices.
///
/// The pool hands out indices only. Callers keep the per-slot state in their
/// own fixed arrays and index them with what `acquire` returns.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per event loop.
///
/// # Example
///
/// ```rust,ignore
/// let mut slots = SlotPool::new(10);
///
/// let index = slots.acquire().unwrap(); // O(1), lowest free index first
/// slots.release(index);                 // O(1)
/// ```
#[derive(Debug)]
pub struct SlotPool {
    /// Liveness per slot.
    live: Box<[bool]>,
    /// Free indices, lowest on top.
    free_list: Vec<usize>,
}

impl SlotPool {
    /// Creates a pool with every index free.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of slots
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");

        Self {
            live: vec![false; capacity].into_boxed_slice(),
            free_list: (0..capacity).rev().collect(),
        }
    }

    /// Returns the total number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.live.len()
    }

    /// Returns the number of live slots.
    #[inline]
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.capacity() - self.free_list.len()
    }

    /// Returns the number of free slots.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Takes a free slot, or `None` when every slot is live.
    pub fn acquire(&mut self) -> Option<usize> {
        let index = self.free_list.pop()?;
        self.live[index] = true;
        Some(index)
    }

    /// Returns a slot to the freelist.
    ///
    /// Returns false if the index was out of range or already free.
    pub fn release(&mut self, index: usize) -> bool {
        match self.live.get_mut(index) {
            Some(live) if *live => {
                *live = false;
                self.free_list.push(index);
                true
            }
            _ => false,
        }
    }

    /// Checks whether a slot is live.
    #[inline]
    #[must_use]
    pub fn is_live(&self, index: usize) -> bool {
        self.live.get(index).copied().unwrap_or(false)
    }

    /// Iterates over live slot indices in ascending order.
    pub fn iter_live(&self) -> impl Iterator<Item = usize> + '_ {
        self.live
            .iter()
            .enumerate()
            .filter_map(|(index, &live)| live.then_some(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_acquire_release() {
        let mut pool = SlotPool::new(4);

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(pool.live_count(), 2);

        assert!(pool.release(a));
        assert!(!pool.is_live(a));
        assert_eq!(pool.free_count(), 3);
    }

    #[test]
    fn test_pool_full() {
        let mut pool = SlotPool::new(2);
        assert!(pool.acquire().is_some());
        assert!(pool.acquire().is_some());
        assert!(pool.acquire().is_none());
    }

    #[test]
    fn test_pool_reuses_released_slot() {
        let mut pool = SlotPool::new(3);
        let _ = pool.acquire();
        let b = pool.acquire().unwrap();
        pool.release(b);
        assert_eq!(pool.acquire(), Some(b));
    }

    #[test]
    fn test_pool_double_release() {
        let mut pool = SlotPool::new(2);
        let a = pool.acquire().unwrap();
        assert!(pool.release(a));
        assert!(!pool.release(a));
        assert!(!pool.release(99));
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn test_pool_iter_live() {
        let mut pool = SlotPool::new(4);
        for _ in 0..3 {
            pool.acquire();
        }
        pool.release(1);
        assert_eq!(pool.iter_live().collect::<Vec<_>>(), vec![0, 2]);
    }
}
