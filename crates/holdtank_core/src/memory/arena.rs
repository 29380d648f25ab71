//! # Arena
//!
//! The backing buffer, reserved once and addressed in paragraphs.

use bytemuck::{Pod, Zeroable};

use crate::constants::PARAGRAPH_BYTES;
use crate::error::{PoolError, PoolResult};

/// One 16-byte unit of arena storage.
///
/// The alignment makes every chunk payload 16-byte aligned, which is what
/// lets [`crate::MemoryPool::payload_as`] hand out typed views.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C, align(16))]
pub struct Paragraph(pub [u8; PARAGRAPH_BYTES]);

/// The backing buffer of a pool plus its capacity bookkeeping.
///
/// The arena knows nothing about chunks; it stores paragraphs and keeps the
/// free-paragraph counter the allocator adjusts.
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. It is owned by exactly one pool.
pub struct Arena {
    /// The backing storage.
    storage: Box<[Paragraph]>,
    /// Paragraphs not owned by a used chunk.
    free: u32,
}

impl Arena {
    /// Reserves an arena of `size_bytes`, rounded down to whole paragraphs.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidArgument`] if the size rounds down to zero
    /// paragraphs or exceeds what 32-bit paragraph offsets can address.
    pub fn new(size_bytes: usize) -> PoolResult<Self> {
        let paragraphs = size_bytes / PARAGRAPH_BYTES;
        if paragraphs == 0 {
            return Err(PoolError::InvalidArgument(
                "arena must hold at least one paragraph",
            ));
        }
        let free = u32::try_from(paragraphs)
            .map_err(|_| PoolError::InvalidArgument("arena exceeds 2^32 paragraphs"))?;

        Ok(Self {
            storage: vec![Paragraph::zeroed(); paragraphs].into_boxed_slice(),
            free,
        })
    }

    /// Returns the usable capacity in paragraphs.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn total_paragraphs(&self) -> u32 {
        // Checked against u32 in `new`.
        self.storage.len() as u32
    }

    /// Returns the paragraphs not owned by a used chunk.
    #[inline]
    #[must_use]
    pub const fn free_paragraphs(&self) -> u32 {
        self.free
    }

    /// Charges `paragraphs` to a new allocation.
    #[inline]
    pub(crate) fn take(&mut self, paragraphs: u32) {
        self.free -= paragraphs;
    }

    /// Returns `paragraphs` from a released allocation.
    #[inline]
    pub(crate) fn give(&mut self, paragraphs: u32) {
        self.free += paragraphs;
    }

    /// Marks the whole arena free again.
    #[inline]
    pub(crate) fn reset(&mut self) {
        self.free = self.total_paragraphs();
    }

    /// Byte view of `paragraphs` paragraphs starting at `offset`.
    #[inline]
    pub(crate) fn bytes(&self, offset: u32, paragraphs: u32) -> &[u8] {
        let start = offset as usize;
        bytemuck::cast_slice(&self.storage[start..start + paragraphs as usize])
    }

    /// Mutable byte view of `paragraphs` paragraphs starting at `offset`.
    #[inline]
    pub(crate) fn bytes_mut(&mut self, offset: u32, paragraphs: u32) -> &mut [u8] {
        let start = offset as usize;
        bytemuck::cast_slice_mut(&mut self.storage[start..start + paragraphs as usize])
    }

    /// Copies a span of paragraphs down to `to`. The spans may overlap.
    #[inline]
    pub(crate) fn relocate(&mut self, from: u32, to: u32, paragraphs: u32) {
        let start = from as usize;
        self.storage
            .copy_within(start..start + paragraphs as usize, to as usize);
    }

    /// Overwrites a span of paragraphs with `byte`.
    #[inline]
    pub(crate) fn fill(&mut self, offset: u32, paragraphs: u32, byte: u8) {
        self.bytes_mut(offset, paragraphs).fill(byte);
    }
}
