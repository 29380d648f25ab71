//! # Asset Cache
//!
//! Id-keyed cache over one [`MemoryPool`]. The pool only reports that an
//! allocation failed; deciding what to throw out is done here:
//!
//! ```text
//! alloc ── ok ──────────────────────────────> fill payload
//!   │
//!   └─ out of capacity
//!        ├─ enough free bytes, just fragmented? ── compact, retry
//!        └─ otherwise ── evict oldest, retry
//!                          └─ nothing evictable ── Exhausted
//! ```
//!
//! Callers address assets by id, never by handle, so handles that go stale
//! when compaction moves a block are never observed outside this module.

use std::fmt::Display;

use holdtank_core::{
    ChunkHandle, CleanupReport, GameClock, MemoryPool, PoolError, PoolStats, TickSource,
};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};

/// Hit and churn counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found the asset resident.
    pub hits: u64,
    /// Lookups that had to load the asset.
    pub misses: u64,
    /// Blocks evicted to make room.
    pub evictions: u64,
    /// Compaction passes run.
    pub compactions: u64,
    /// Loads whose loader failed.
    pub failed_loads: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// An asset cache that never grows past its pool.
///
/// # Thread Safety
///
/// Like the pool beneath it, this cache is NOT thread-safe.
pub struct AssetCache<C: TickSource = GameClock> {
    /// Backing pool.
    pool: MemoryPool<C>,
    /// Compact fragmented free space before evicting.
    compact_before_evict: bool,
    /// Evictions one load may trigger.
    eviction_limit: Option<usize>,
    /// Counters.
    stats: CacheStats,
}

impl<C: TickSource> AssetCache<C> {
    /// Builds a cache and its pool.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Pool`] if the pool configuration is invalid.
    pub fn new(config: &CacheConfig, clock: C) -> CacheResult<Self> {
        let pool = MemoryPool::from_config(&config.pool, clock)?;
        Ok(Self::with_pool(pool, config))
    }

    /// Wraps an existing pool. Blocks already in it become cache entries.
    #[must_use]
    pub fn with_pool(pool: MemoryPool<C>, config: &CacheConfig) -> Self {
        Self {
            pool,
            compact_before_evict: config.compact_before_evict,
            eviction_limit: config.eviction_limit(),
            stats: CacheStats::default(),
        }
    }

    /// Returns the backing pool.
    #[inline]
    #[must_use]
    pub const fn pool(&self) -> &MemoryPool<C> {
        &self.pool
    }

    /// Returns the counters.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Returns pool-level statistics.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Whether an asset is resident. Does not count as a reference.
    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.pool.find(id).is_some()
    }

    /// Looks up a resident asset and marks it freshly used. Pins are kept.
    pub fn get(&mut self, id: u32) -> Option<ChunkHandle> {
        let handle = self.touch(id);
        if handle.is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        handle
    }

    /// Payload of a resident asset. Does not count as a reference.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotCached`] if the asset is not resident.
    pub fn bytes(&self, id: u32) -> CacheResult<&[u8]> {
        let handle = self.pool.find(id).ok_or(CacheError::NotCached(id))?;
        Ok(self.pool.bytes(handle)?)
    }

    /// Returns a resident asset, or makes room for `len` bytes and lets
    /// `loader` fill them.
    ///
    /// # Errors
    ///
    /// - [`CacheError::TooLarge`] if `len` exceeds an empty pool
    /// - [`CacheError::Exhausted`] if eviction cannot free enough room
    /// - [`CacheError::Load`] if `loader` fails; its block is released
    pub fn load_with<F, E>(&mut self, id: u32, len: usize, loader: F) -> CacheResult<ChunkHandle>
    where
        F: FnOnce(&mut [u8]) -> Result<(), E>,
        E: Display,
    {
        if let Some(handle) = self.touch(id) {
            self.stats.hits += 1;
            return Ok(handle);
        }
        self.stats.misses += 1;

        let pool_size = self.pool.pool_size();
        if len > pool_size {
            return Err(CacheError::TooLarge { id, len, pool_size });
        }

        let handle = self.make_room(id, len)?;
        let loaded = loader(self.pool.bytes_mut(handle)?);
        if let Err(e) = loaded {
            self.pool.free(handle)?;
            self.stats.failed_loads += 1;
            tracing::warn!(id, len, error = %e, "asset load failed");
            return Err(CacheError::Load {
                id,
                reason: e.to_string(),
            });
        }

        tracing::debug!(id, len, %handle, "asset loaded");
        Ok(handle)
    }

    /// Locks an asset: never evicted, never moved. Use while it is being
    /// read by something that holds raw pointers into it, e.g. a playing voice.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotCached`] if the asset is not resident.
    pub fn pin(&mut self, id: u32) -> CacheResult<()> {
        let handle = self.resolve(id)?;
        Ok(self.pool.lock(handle)?)
    }

    /// Holds an asset against eviction; compaction may still move it.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotCached`] if the asset is not resident.
    pub fn hold(&mut self, id: u32) -> CacheResult<()> {
        let handle = self.resolve(id)?;
        Ok(self.pool.mark_in_use(handle)?)
    }

    /// Lifts a pin or hold, stamping the asset as freshly used.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotCached`] if the asset is not resident.
    pub fn release(&mut self, id: u32) -> CacheResult<()> {
        let handle = self.resolve(id)?;
        Ok(self.pool.reference(handle)?)
    }

    /// Drops an asset regardless of its state.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotCached`] if the asset is not resident.
    pub fn evict(&mut self, id: u32) -> CacheResult<()> {
        let handle = self.resolve(id)?;
        self.pool.free(handle)?;
        self.stats.evictions += 1;
        Ok(())
    }

    /// Defragments the pool. Locked assets stay where they are.
    pub fn compact(&mut self) -> CleanupReport {
        let report = self.pool.cleanup();
        self.stats.compactions += 1;
        tracing::debug!(
            moved = report.moved(),
            largest_avail = self.pool.largest_avail(),
            "cache compacted"
        );
        report
    }

    /// Drops every asset.
    pub fn clear(&mut self) {
        self.pool.reset();
    }

    /// Re-stamps a resident asset. Pinned assets keep their pin.
    fn touch(&mut self, id: u32) -> Option<ChunkHandle> {
        let handle = self.pool.find(id)?;
        if self.pool.state(handle).ok()?.is_evictable() {
            self.pool.reference(handle).ok()?;
        }
        Some(handle)
    }

    fn resolve(&self, id: u32) -> CacheResult<ChunkHandle> {
        self.pool.find(id).ok_or(CacheError::NotCached(id))
    }

    /// Allocates, compacting and evicting until the block fits.
    fn make_room(&mut self, id: u32, len: usize) -> CacheResult<ChunkHandle> {
        let mut evicted = 0;
        let mut compacted = false;

        loop {
            match self.pool.alloc(len, id) {
                Ok(handle) => return Ok(handle),
                Err(PoolError::OutOfCapacity { .. }) => {}
                Err(e) => return Err(e.into()),
            }

            // Compaction only helps when the free total would fit the block.
            if self.compact_before_evict && !compacted && self.pool.avail() >= len {
                self.compact();
                compacted = true;
                continue;
            }

            if self.eviction_limit.is_some_and(|limit| evicted >= limit) {
                break;
            }
            let Some(victim) = self.pool.free_oldest() else {
                break;
            };
            tracing::debug!(id, %victim, "evicted to make room");
            evicted += 1;
            self.stats.evictions += 1;
            compacted = false;
        }

        tracing::warn!(id, len, evicted, avail = self.pool.avail(), "cache exhausted");
        Err(CacheError::Exhausted { id, len, evicted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdtank_core::{ChunkState, ManualClock, PoolConfig};

    /// 64 paragraphs: eight 100-byte assets fill it exactly.
    fn cache(config: CacheConfig) -> AssetCache<ManualClock> {
        let config = CacheConfig {
            pool: PoolConfig::with_capacity(1024),
            ..config
        };
        AssetCache::new(&config, ManualClock::default()).unwrap()
    }

    fn fill(byte: u8) -> impl FnOnce(&mut [u8]) -> Result<(), String> {
        move |buf: &mut [u8]| {
            buf.fill(byte);
            Ok(())
        }
    }

    fn load_eight(cache: &mut AssetCache<ManualClock>) {
        for id in 1..=8u8 {
            cache.pool().clock().advance(16);
            cache.load_with(u32::from(id), 100, fill(id)).unwrap();
        }
        assert_eq!(cache.pool().free_paragraphs(), 0);
    }

    #[test]
    fn test_miss_then_hit() {
        let mut cache = cache(CacheConfig::default());
        let first = cache.load_with(7, 100, fill(0xAA)).unwrap();
        let again = cache.load_with(7, 100, fill(0xBB)).unwrap();
        assert_eq!(first, again);
        assert!(cache.bytes(7).unwrap().iter().all(|&b| b == 0xAA));
        assert_eq!(cache.get(7), Some(first));
        assert_eq!(cache.get(8), None);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (2, 2));
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_full_cache_evicts_oldest() {
        let mut cache = cache(CacheConfig::default());
        load_eight(&mut cache);
        cache.get(1);

        cache.load_with(9, 100, fill(9)).unwrap();
        assert!(cache.contains(1));
        assert!(!cache.contains(2));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_fragmented_space_is_compacted_not_evicted() {
        let mut cache = cache(CacheConfig::default());
        load_eight(&mut cache);
        cache.evict(2).unwrap();
        cache.evict(4).unwrap();
        let before = cache.stats().evictions;

        // 14 paragraphs: no single hole fits, both together do.
        cache.load_with(20, 200, fill(20)).unwrap();
        let stats = cache.stats();
        assert_eq!(stats.compactions, 1);
        assert_eq!(stats.evictions, before);
        for id in [1, 3, 5, 6, 7, 8] {
            assert!(cache.bytes(id).unwrap().iter().all(|&b| u32::from(b) == id));
        }
        cache.pool().verify().unwrap();
    }

    #[test]
    fn test_compaction_can_be_disabled() {
        let mut cache = cache(CacheConfig {
            compact_before_evict: false,
            ..CacheConfig::default()
        });
        load_eight(&mut cache);
        cache.evict(2).unwrap();
        cache.evict(4).unwrap();

        cache.load_with(20, 200, fill(20)).unwrap();
        assert_eq!(cache.stats().compactions, 0);
        assert!(!cache.contains(1));
    }

    #[test]
    fn test_pinned_and_held_assets_survive() {
        let mut cache = cache(CacheConfig::default());
        load_eight(&mut cache);
        cache.pin(1).unwrap();
        cache.hold(2).unwrap();

        cache.load_with(9, 100, fill(9)).unwrap();
        assert!(cache.contains(1));
        assert!(cache.contains(2));
        assert!(!cache.contains(3));

        cache.release(1).unwrap();
        cache.release(2).unwrap();
        cache.pool().clock().advance(16);
        cache.load_with(10, 100, fill(10)).unwrap();
        assert!(!cache.contains(4));
    }

    #[test]
    fn test_hit_keeps_pin() {
        let mut cache = cache(CacheConfig::default());
        cache.load_with(1, 100, fill(1)).unwrap();
        cache.pin(1).unwrap();
        let handle = cache.get(1).unwrap();
        assert_eq!(cache.pool().state(handle).unwrap(), ChunkState::Locked);
    }

    #[test]
    fn test_everything_pinned_is_exhausted() {
        let mut cache = cache(CacheConfig::default());
        load_eight(&mut cache);
        for id in 1..=8 {
            cache.pin(id).unwrap();
        }
        let err = cache.load_with(9, 100, fill(9)).unwrap_err();
        assert_eq!(
            err,
            CacheError::Exhausted {
                id: 9,
                len: 100,
                evicted: 0
            }
        );
    }

    #[test]
    fn test_eviction_limit_caps_a_load() {
        let mut cache = cache(CacheConfig {
            max_evictions_per_load: 1,
            ..CacheConfig::default()
        });
        load_eight(&mut cache);
        let err = cache.load_with(20, 200, fill(20)).unwrap_err();
        assert!(matches!(err, CacheError::Exhausted { evicted: 1, .. }));
    }

    #[test]
    fn test_too_large_fails_fast() {
        let mut cache = cache(CacheConfig::default());
        load_eight(&mut cache);
        let err = cache.load_with(9, 4096, fill(9)).unwrap_err();
        assert!(matches!(err, CacheError::TooLarge { pool_size: 1008, .. }));
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.pool().len(), 8);
    }

    #[test]
    fn test_failed_loader_releases_block() {
        let mut cache = cache(CacheConfig::default());
        let err = cache
            .load_with(3, 100, |_| Err::<(), _>("truncated sample"))
            .unwrap_err();
        assert_eq!(
            err,
            CacheError::Load {
                id: 3,
                reason: "truncated sample".to_string()
            }
        );
        assert!(!cache.contains(3));
        assert_eq!(cache.pool().free_paragraphs(), 64);
        assert_eq!(cache.stats().failed_loads, 1);
    }

    #[test]
    fn test_unknown_id_is_not_cached() {
        let mut cache = cache(CacheConfig::default());
        assert_eq!(cache.pin(5), Err(CacheError::NotCached(5)));
        assert_eq!(cache.evict(5), Err(CacheError::NotCached(5)));
        assert!(cache.bytes(5).is_err());
    }
}
