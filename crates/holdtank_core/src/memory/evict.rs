//! # LRU Eviction
//!
//! Picks the block whose stamp is furthest behind the current tick.
//!
//! Ages are computed on the 16-bit stamp circle:
//!
//! ```text
//! now = 0x0003
//! stamp 0xFFFE  -> age 5   (stamped before the wrap, oldest)
//! stamp 0x0001  -> age 2
//! ```
//!
//! Pinned blocks (in use or locked) are never candidates.

use super::chunk::{ChunkHandle, ChunkState};
use super::pool::MemoryPool;
use crate::clock::TickSource;

impl<C: TickSource> MemoryPool<C> {
    /// Finds the least recently referenced evictable block.
    ///
    /// Ties go to the lowest address. Returns `None` when every live block is
    /// pinned or the pool is empty.
    #[must_use]
    pub fn find_oldest(&self) -> Option<ChunkHandle> {
        let now = self.now();
        let mut oldest = None;
        let mut oldest_age = 0u16;

        for (slot, chunk) in self.chunks.used_chain() {
            let ChunkState::Timestamped(stamp) = chunk.state else {
                continue;
            };
            let age = stamp.age_at(now);
            if oldest.is_none() || age > oldest_age {
                oldest = Some(slot);
                oldest_age = age;
            }
        }

        oldest.map(|slot| self.chunks.handle(slot))
    }

    /// Frees the least recently referenced evictable block.
    ///
    /// The returned handle is already stale. It identifies what was evicted
    /// so callers can drop their own references to it; every pool operation
    /// on it fails with [`crate::PoolError::StaleHandle`].
    pub fn free_oldest(&mut self) -> Option<ChunkHandle> {
        let handle = self.find_oldest()?;
        let id = self.chunks.get(handle.slot()).id;
        self.free(handle).ok()?;
        tracing::debug!(%handle, id, free_paragraphs = self.free_paragraphs(), "evicted oldest block");
        Some(handle)
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::ManualClock;
    use crate::memory::MemoryPool;

    /// One stamp quantum at the default shift.
    const QUANTUM: u32 = 16;

    fn pool() -> MemoryPool<ManualClock> {
        MemoryPool::with_clock(4096, ManualClock::default()).unwrap()
    }

    #[test]
    fn test_empty_pool_has_no_oldest() {
        let mut pool = pool();
        assert_eq!(pool.find_oldest(), None);
        assert_eq!(pool.free_oldest(), None);
    }

    #[test]
    fn test_oldest_by_stamp_not_address() {
        let mut pool = pool();
        let a = pool.alloc(64, 1).unwrap();
        pool.clock().advance(QUANTUM);
        let b = pool.alloc(64, 2).unwrap();
        pool.clock().advance(QUANTUM);
        let _c = pool.alloc(64, 3).unwrap();

        assert_eq!(pool.find_oldest(), Some(a));

        pool.clock().advance(QUANTUM);
        pool.reference(a).unwrap();
        assert_eq!(pool.find_oldest(), Some(b));
    }

    #[test]
    fn test_ties_go_to_lowest_address() {
        let mut pool = pool();
        let a = pool.alloc(64, 1).unwrap();
        let _b = pool.alloc(64, 2).unwrap();
        assert_eq!(pool.find_oldest(), Some(a));
    }

    #[test]
    fn test_pins_are_never_oldest() {
        let mut pool = pool();
        let a = pool.alloc(64, 1).unwrap();
        pool.clock().advance(QUANTUM);
        let b = pool.alloc(64, 2).unwrap();
        pool.clock().advance(QUANTUM);
        let c = pool.alloc(64, 3).unwrap();

        pool.mark_in_use(a).unwrap();
        pool.lock(b).unwrap();
        assert_eq!(pool.find_oldest(), Some(c));

        pool.mark_in_use(c).unwrap();
        assert_eq!(pool.find_oldest(), None);
        assert_eq!(pool.free_oldest(), None);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_free_oldest_returns_stale_token() {
        let mut pool = pool();
        let a = pool.alloc(64, 1).unwrap();
        pool.clock().advance(QUANTUM);
        let _b = pool.alloc(64, 2).unwrap();
        let before = pool.free_paragraphs();

        let evicted = pool.free_oldest().unwrap();
        assert_eq!(evicted, a);
        assert!(!pool.contains(evicted));
        assert!(pool.get_id(evicted).is_err());
        assert_eq!(pool.free_paragraphs(), before + 5);
    }
}
