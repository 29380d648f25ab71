//! # Memory Pool
//!
//! Variable-size allocator over a single arena, with per-chunk recency and
//! pin state for use as an LRU cache.

use bytemuck::Pod;

use super::arena::Arena;
use super::chain::{ChunkTable, SlotId};
use super::chunk::{ChunkHandle, ChunkInfo, ChunkState, Tick};
use crate::clock::{GameClock, TickSource};
use crate::config::PoolConfig;
use crate::constants::{FREED_FILL, HEADER_BYTES, HEADER_PARAGRAPHS, PARAGRAPH_BYTES};
use crate::error::{PoolError, PoolResult};

/// A fixed-capacity memory pool that doubles as an LRU cache.
///
/// Blocks of any size are carved first-fit from one arena reserved at
/// construction. Each block carries a caller-supplied id and a state that is
/// either a recency stamp or a pin ([`ChunkState::InUse`],
/// [`ChunkState::Locked`]).
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. It belongs to the game loop.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = MemoryPool::new(1024)?;          // 64 paragraphs
///
/// let handle = pool.alloc(100, 1)?;               // 8 paragraphs
/// pool.bytes_mut(handle)?.fill(0xAB);
///
/// pool.free(handle)?;
/// assert!(pool.free(handle).is_err());            // stale, not UB
/// ```
pub struct MemoryPool<C: TickSource = GameClock> {
    /// Backing storage and free-paragraph counter.
    pub(super) arena: Arena,
    /// Chunk metadata with the free and used chains.
    pub(super) chunks: ChunkTable,
    /// Recency clock.
    pub(super) clock: C,
    /// Leftover paragraphs absorbed into an allocation instead of split off.
    split_slack: u32,
    /// Quantization shift for recency stamps.
    tick_shift: u32,
    /// Whether payloads are pattern-filled on alloc and free.
    debug_fill: bool,
}

impl MemoryPool<GameClock> {
    /// Creates a pool of `size_bytes` stamped by a wall-clock [`GameClock`].
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidArgument`] if `size_bytes` is smaller
    /// than one paragraph.
    pub fn new(size_bytes: usize) -> PoolResult<Self> {
        Self::with_clock(size_bytes, GameClock::new())
    }
}

impl<C: TickSource> MemoryPool<C> {
    /// Creates a pool of `size_bytes` with default tuning and the given clock.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidArgument`] if `size_bytes` is smaller
    /// than one paragraph.
    pub fn with_clock(size_bytes: usize, clock: C) -> PoolResult<Self> {
        Self::from_config(&PoolConfig::with_capacity(size_bytes), clock)
    }

    /// Creates a pool from a configuration.
    ///
    /// The arena starts as one free chunk spanning every usable paragraph.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] for out-of-range tuning and
    /// [`PoolError::InvalidArgument`] for an arena smaller than a paragraph.
    pub fn from_config(config: &PoolConfig, clock: C) -> PoolResult<Self> {
        config.validate()?;
        let arena = Arena::new(config.capacity_bytes)?;
        let mut chunks = ChunkTable::with_capacity(config.initial_slots);
        chunks.insert_free(0, arena.total_paragraphs(), false);

        tracing::debug!(
            paragraphs = arena.total_paragraphs(),
            split_slack = config.split_slack,
            tick_shift = config.tick_shift,
            "memory pool initialized"
        );

        Ok(Self {
            arena,
            chunks,
            clock,
            split_slack: config.split_slack,
            tick_shift: config.tick_shift,
            debug_fill: config.debug_fill,
        })
    }

    /// Returns the recency clock.
    #[inline]
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Returns the backing arena.
    #[inline]
    #[must_use]
    pub const fn arena(&self) -> &Arena {
        &self.arena
    }

    /// The current quantized tick.
    #[inline]
    #[must_use]
    pub fn now(&self) -> Tick {
        Tick::quantize(self.clock.ticks(), self.tick_shift)
    }

    // -------------------------------------------------------------------------
    // Allocation
    // -------------------------------------------------------------------------

    /// Allocates a block for `bytes` of payload, tagged with `id`.
    ///
    /// The request plus its header is rounded up to whole paragraphs and
    /// served first-fit in address order. Leftovers larger than the split
    /// slack stay free; smaller leftovers are granted with the block. The
    /// new block is stamped with the current tick.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidArgument`] if `bytes` is zero
    /// - [`PoolError::OutOfCapacity`] if no free chunk is large enough; this
    ///   is the signal to evict or compact and retry
    pub fn alloc(&mut self, bytes: usize, id: u32) -> PoolResult<ChunkHandle> {
        if bytes == 0 {
            return Err(PoolError::InvalidArgument("allocation size must be non-zero"));
        }

        // Checked against total rather than free capacity; the scan below
        // catches the fragmented case.
        let wanted = match paragraphs_for(bytes) {
            Some(wanted) if wanted <= self.arena.total_paragraphs() => wanted,
            _ => return Err(self.out_of_capacity(bytes, id)),
        };

        let mut prev = None;
        let mut cursor = self.chunks.free_head();
        let slot = loop {
            let Some(slot) = cursor else {
                return Err(self.out_of_capacity(bytes, id));
            };
            let chunk = self.chunks.get(slot);
            if chunk.size >= wanted {
                break slot;
            }
            prev = cursor;
            cursor = chunk.next;
        };

        let (offset, size) = {
            let chunk = self.chunks.get(slot);
            (chunk.offset, chunk.size)
        };
        let granted = if size - wanted <= self.split_slack {
            size
        } else {
            wanted
        };

        self.chunks.unlink_free(slot, prev);
        if granted < size {
            tracing::debug!(offset, granted, remainder = size - granted, "splitting free chunk");
            self.chunks.insert_free(offset + granted, size - granted, true);
        }

        let stamp = ChunkState::Timestamped(self.now());
        let handle = self.chunks.occupy(slot, granted, id, bytes, stamp);
        self.arena.take(granted);

        if self.debug_fill {
            self.arena
                .fill(offset + HEADER_PARAGRAPHS, granted - HEADER_PARAGRAPHS, id.to_le_bytes()[0]);
        }

        tracing::trace!(%handle, id, bytes, offset, paragraphs = granted, "alloc");
        Ok(handle)
    }

    /// Releases a block back to the free chain, merging with free neighbours.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::StaleHandle`] if the block was already freed,
    /// evicted or relocated.
    pub fn free(&mut self, handle: ChunkHandle) -> PoolResult<()> {
        let slot = self.resolve(handle)?;
        let (offset, size, id) = {
            let chunk = self.chunks.get(slot);
            (chunk.offset, chunk.size, chunk.id)
        };

        self.chunks.unlink_used(slot);
        self.chunks.release(slot);
        if self.debug_fill {
            self.arena
                .fill(offset + HEADER_PARAGRAPHS, size - HEADER_PARAGRAPHS, FREED_FILL);
        }
        self.chunks.insert_free(offset, size, true);
        self.arena.give(size);

        tracing::trace!(%handle, id, offset, paragraphs = size, "free");
        Ok(())
    }

    /// Returns the arena to a single free chunk. Every handle goes stale.
    pub fn reset(&mut self) {
        self.chunks.clear();
        self.chunks.insert_free(0, self.arena.total_paragraphs(), false);
        self.arena.reset();
        if self.debug_fill {
            self.arena.fill(0, self.arena.total_paragraphs(), FREED_FILL);
        }
        tracing::debug!("memory pool reset");
    }

    // -------------------------------------------------------------------------
    // Recency & pins
    // -------------------------------------------------------------------------

    /// Stamps a block with the current tick, making it the freshest.
    ///
    /// This also lifts an [`ChunkState::InUse`] or [`ChunkState::Locked`]
    /// pin: the block becomes evictable again.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::StaleHandle`] for a dead handle.
    pub fn reference(&mut self, handle: ChunkHandle) -> PoolResult<()> {
        let stamp = ChunkState::Timestamped(self.now());
        self.set_state(handle, stamp)
    }

    /// Pins a block against eviction. Compaction may still move it.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::StaleHandle`] for a dead handle.
    pub fn mark_in_use(&mut self, handle: ChunkHandle) -> PoolResult<()> {
        self.set_state(handle, ChunkState::InUse)
    }

    /// Pins a block against eviction and relocation.
    ///
    /// Locked blocks are left where they are by [`MemoryPool::cleanup`], so
    /// the arena may stay fragmented around them. Lock sparingly, e.g. only
    /// while a sample is playing.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::StaleHandle`] for a dead handle.
    pub fn lock(&mut self, handle: ChunkHandle) -> PoolResult<()> {
        self.set_state(handle, ChunkState::Locked)
    }

    /// Returns a block's recency / pin state.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::StaleHandle`] for a dead handle.
    pub fn state(&self, handle: ChunkHandle) -> PoolResult<ChunkState> {
        Ok(self.chunks.get(self.resolve(handle)?).state)
    }

    fn set_state(&mut self, handle: ChunkHandle, state: ChunkState) -> PoolResult<()> {
        let slot = self.resolve(handle)?;
        self.chunks.get_mut(slot).state = state;
        tracing::trace!(%handle, ?state, "state change");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Finds the lowest-addressed live block tagged `id`.
    ///
    /// Ids are not required to be unique; later duplicates are shadowed.
    #[must_use]
    pub fn find(&self, id: u32) -> Option<ChunkHandle> {
        self.chunks
            .used_chain()
            .find(|(_, chunk)| chunk.id == id)
            .map(|(slot, _)| self.chunks.handle(slot))
    }

    /// Returns the id a block was allocated with.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::StaleHandle`] for a dead handle.
    pub fn get_id(&self, handle: ChunkHandle) -> PoolResult<u32> {
        Ok(self.chunks.get(self.resolve(handle)?).id)
    }

    /// Whether the handle still refers to a live block.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: ChunkHandle) -> bool {
        self.chunks.resolve(handle).is_some()
    }

    /// Number of live blocks.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.chunks.used_count()
    }

    /// Whether no block is allocated.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.chunks.used_count() == 0
    }

    /// Iterates live blocks in address order.
    pub fn iter(&self) -> impl Iterator<Item = ChunkInfo> + '_ {
        self.chunks.used_chain().map(|(slot, chunk)| ChunkInfo {
            handle: self.chunks.handle(slot),
            id: chunk.id,
            state: chunk.state,
            offset: chunk.offset,
            paragraphs: chunk.size,
            len: chunk.len,
        })
    }

    // -------------------------------------------------------------------------
    // Payload access
    // -------------------------------------------------------------------------

    /// The payload, exactly as many bytes as were requested.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::StaleHandle`] for a dead handle.
    pub fn bytes(&self, handle: ChunkHandle) -> PoolResult<&[u8]> {
        let chunk = *self.chunks.get(self.resolve(handle)?);
        let payload = self
            .arena
            .bytes(chunk.offset + HEADER_PARAGRAPHS, chunk.size - HEADER_PARAGRAPHS);
        Ok(&payload[..chunk.len])
    }

    /// Mutable payload, exactly as many bytes as were requested.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::StaleHandle`] for a dead handle.
    pub fn bytes_mut(&mut self, handle: ChunkHandle) -> PoolResult<&mut [u8]> {
        let chunk = *self.chunks.get(self.resolve(handle)?);
        let payload = self
            .arena
            .bytes_mut(chunk.offset + HEADER_PARAGRAPHS, chunk.size - HEADER_PARAGRAPHS);
        Ok(&mut payload[..chunk.len])
    }

    /// Payload bytes actually granted, including rounding and absorbed slack.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::StaleHandle`] for a dead handle.
    pub fn capacity_bytes(&self, handle: ChunkHandle) -> PoolResult<usize> {
        let chunk = self.chunks.get(self.resolve(handle)?);
        Ok(paragraph_bytes(chunk.size) - HEADER_BYTES)
    }

    /// The payload viewed as a slice of `T`.
    ///
    /// Payloads are 16-byte aligned, so any `T` with alignment up to 16 works
    /// as long as the requested length is a whole number of `T`.
    ///
    /// # Errors
    ///
    /// - [`PoolError::StaleHandle`] for a dead handle
    /// - [`PoolError::InvalidArgument`] if the length does not divide evenly
    pub fn payload_as<T: Pod>(&self, handle: ChunkHandle) -> PoolResult<&[T]> {
        bytemuck::try_cast_slice(self.bytes(handle)?).map_err(|_| {
            PoolError::InvalidArgument("payload is not a whole number of elements")
        })
    }

    /// The payload viewed as a mutable slice of `T`.
    ///
    /// # Errors
    ///
    /// - [`PoolError::StaleHandle`] for a dead handle
    /// - [`PoolError::InvalidArgument`] if the length does not divide evenly
    pub fn payload_as_mut<T: Pod>(&mut self, handle: ChunkHandle) -> PoolResult<&mut [T]> {
        bytemuck::try_cast_slice_mut(self.bytes_mut(handle)?).map_err(|_| {
            PoolError::InvalidArgument("payload is not a whole number of elements")
        })
    }

    // -------------------------------------------------------------------------
    // Capacity queries
    // -------------------------------------------------------------------------

    /// Total free bytes, less one header.
    ///
    /// The free space may be fragmented; after [`MemoryPool::cleanup`] with
    /// nothing locked, an allocation of this size is guaranteed to succeed.
    #[inline]
    #[must_use]
    pub fn avail(&self) -> usize {
        paragraph_bytes(self.arena.free_paragraphs()).saturating_sub(HEADER_BYTES)
    }

    /// Largest allocation that would succeed right now.
    #[must_use]
    pub fn largest_avail(&self) -> usize {
        paragraph_bytes(self.largest_free_paragraphs()).saturating_sub(HEADER_BYTES)
    }

    /// Largest allocation an empty pool could serve.
    #[inline]
    #[must_use]
    pub fn pool_size(&self) -> usize {
        paragraph_bytes(self.arena.total_paragraphs()).saturating_sub(HEADER_BYTES)
    }

    /// Paragraphs not owned by a used chunk.
    #[inline]
    #[must_use]
    pub const fn free_paragraphs(&self) -> u32 {
        self.arena.free_paragraphs()
    }

    /// Usable capacity in paragraphs.
    #[inline]
    #[must_use]
    pub fn total_paragraphs(&self) -> u32 {
        self.arena.total_paragraphs()
    }

    pub(super) fn largest_free_paragraphs(&self) -> u32 {
        self.chunks
            .free_chain()
            .map(|(_, chunk)| chunk.size)
            .max()
            .unwrap_or(0)
    }

    pub(super) fn resolve(&self, handle: ChunkHandle) -> PoolResult<SlotId> {
        self.chunks
            .resolve(handle)
            .ok_or(PoolError::StaleHandle(handle))
    }

    fn out_of_capacity(&self, requested: usize, id: u32) -> PoolError {
        let largest = self.largest_avail();
        tracing::warn!(id, requested, largest, "allocation failed");
        PoolError::OutOfCapacity { requested, largest }
    }
}

/// Paragraphs needed for `bytes` of payload plus a header, rounded up.
fn paragraphs_for(bytes: usize) -> Option<u32> {
    let total = bytes.checked_add(HEADER_BYTES + PARAGRAPH_BYTES - 1)?;
    u32::try_from(total / PARAGRAPH_BYTES).ok()
}

/// Byte size of a paragraph count.
#[inline]
const fn paragraph_bytes(paragraphs: u32) -> usize {
    paragraphs as usize * PARAGRAPH_BYTES
}
