//! # Chunk Identity & State
//!
//! Chunks are addressed through handles consisting of:
//! - A slot index into the pool's chunk table
//! - A generation counter for detecting stale handles
//!
//! A chunk's recency and pin state share one tagged field, so a pinned
//! chunk can never be mistaken for a very old one.

use std::fmt;

/// Handle to an allocated chunk.
///
/// The handle is split into two parts:
/// - Lower 32 bits: Slot in the chunk table
/// - Upper 32 bits: Generation counter for detecting stale handles
///
/// Freeing, evicting or relocating a chunk advances its generation, so any
/// handle taken before that point is rejected from then on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ChunkHandle(u64);

impl ChunkHandle {
    /// Creates a handle from slot and generation.
    #[inline]
    #[must_use]
    pub(crate) const fn new(slot: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (slot as u64))
    }

    /// Returns the slot portion of the handle.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn slot(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the handle.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl fmt::Display for ChunkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.slot(), self.generation())
    }
}

/// A quantized recency stamp.
///
/// Stamps live on a 16-bit circle: ages are measured by wrapping
/// subtraction, so ordering survives the counter rolling over as long as
/// no live stamp is a full horizon old.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Tick(pub u16);

impl Tick {
    /// Quantizes a raw tick count.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn quantize(raw: u32, shift: u32) -> Self {
        Self((raw >> shift) as u16)
    }

    /// Quanta elapsed between this stamp and `now`.
    #[inline]
    #[must_use]
    pub const fn age_at(self, now: Tick) -> u16 {
        now.0.wrapping_sub(self.0)
    }
}

/// Recency and pin state of a used chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkState {
    /// Evictable; stamped at its last reference.
    Timestamped(Tick),
    /// Never evicted, but may be moved by compaction.
    InUse,
    /// Never evicted and never moved.
    Locked,
}

impl ChunkState {
    /// Whether the evictor may select this chunk.
    #[inline]
    #[must_use]
    pub const fn is_evictable(self) -> bool {
        matches!(self, Self::Timestamped(_))
    }

    /// Whether compaction may relocate this chunk.
    #[inline]
    #[must_use]
    pub const fn is_movable(self) -> bool {
        !matches!(self, Self::Locked)
    }
}

/// Snapshot of a live chunk, as yielded by [`crate::MemoryPool::iter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Handle to the chunk.
    pub handle: ChunkHandle,
    /// Caller-supplied correlation id.
    pub id: u32,
    /// Recency / pin state.
    pub state: ChunkState,
    /// Paragraph offset of the chunk header within the arena.
    pub offset: u32,
    /// Paragraphs spanned, header included.
    pub paragraphs: u32,
    /// Payload bytes requested at allocation.
    pub len: usize,
}
