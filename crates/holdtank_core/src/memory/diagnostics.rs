//! # Pool Diagnostics
//!
//! Read-only statistics and a full integrity walk of both chains.

use super::chain::{ChainIter, SlotKind};
use super::pool::MemoryPool;
use crate::clock::TickSource;
use crate::error::{PoolError, PoolResult};

/// Point-in-time statistics of a pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Usable capacity in paragraphs.
    pub total_paragraphs: u32,
    /// Paragraphs not owned by a used chunk.
    pub free_paragraphs: u32,
    /// Largest single free chunk in paragraphs.
    pub largest_free_paragraphs: u32,
    /// Live blocks.
    pub used_chunks: usize,
    /// Free chunks on the free chain.
    pub free_chunks: usize,
    /// Blocks pinned in use.
    pub in_use_chunks: usize,
    /// Blocks locked in place.
    pub locked_chunks: usize,
}

impl PoolStats {
    /// Share of free space outside the largest free chunk, from 0.0 (one
    /// free chunk, or none) to nearly 1.0 (free space in tiny pieces).
    #[must_use]
    pub fn fragmentation(&self) -> f64 {
        if self.free_paragraphs == 0 {
            return 0.0;
        }
        1.0 - f64::from(self.largest_free_paragraphs) / f64::from(self.free_paragraphs)
    }
}

impl<C: TickSource> MemoryPool<C> {
    /// Collects statistics in one pass over both chains.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            total_paragraphs: self.arena.total_paragraphs(),
            free_paragraphs: self.arena.free_paragraphs(),
            ..PoolStats::default()
        };
        for (_, chunk) in self.chunks.free_chain() {
            stats.free_chunks += 1;
            stats.largest_free_paragraphs = stats.largest_free_paragraphs.max(chunk.size);
        }
        for info in self.iter() {
            stats.used_chunks += 1;
            match info.state {
                super::ChunkState::InUse => stats.in_use_chunks += 1,
                super::ChunkState::Locked => stats.locked_chunks += 1,
                super::ChunkState::Timestamped(_) => {}
            }
        }
        stats
    }

    /// Walks both chains and checks every structural invariant:
    ///
    /// - both chains ascend by address, and used back-links mirror forward links
    /// - no chunk is empty, no two chunks overlap
    /// - no two free chunks touch (they should have been merged)
    /// - free + used paragraphs cover the arena exactly
    /// - the free counter matches the free chain
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Corrupted`] describing the first violation.
    pub fn verify(&self) -> PoolResult<()> {
        let free_sum = walk(self.chunks.free_chain(), SlotKind::Free, "free")?;
        let used_sum = walk(self.chunks.used_chain(), SlotKind::Used, "used")?;

        let mut prev_free_end = None;
        for (_, chunk) in self.chunks.free_chain() {
            if prev_free_end == Some(chunk.offset) {
                return Err(corrupted(format!(
                    "unmerged free chunks meet at paragraph {}",
                    chunk.offset
                )));
            }
            prev_free_end = Some(chunk.end());
        }

        let mut expected_prev = None;
        let mut used_count = 0;
        for (slot, chunk) in self.chunks.used_chain() {
            if chunk.prev != expected_prev {
                return Err(corrupted(format!("used chunk {slot} has a broken back-link")));
            }
            expected_prev = Some(slot);
            used_count += 1;
        }
        if used_count != self.len() {
            return Err(corrupted(format!(
                "used count {} but {used_count} chunks on the chain",
                self.len()
            )));
        }

        let mut spans: Vec<(u32, u32)> = self
            .chunks
            .free_chain()
            .chain(self.chunks.used_chain())
            .map(|(_, chunk)| (chunk.offset, chunk.end()))
            .collect();
        spans.sort_unstable();
        let mut cursor = 0;
        for (start, end) in spans {
            if start != cursor {
                return Err(corrupted(format!(
                    "paragraph {cursor} expected a chunk start, found {start}"
                )));
            }
            cursor = end;
        }

        let total = self.arena.total_paragraphs();
        if cursor != total || free_sum + used_sum != total {
            return Err(corrupted(format!(
                "free {free_sum} + used {used_sum} paragraphs, arena holds {total}"
            )));
        }
        if free_sum != self.arena.free_paragraphs() {
            return Err(corrupted(format!(
                "free counter {} but free chain holds {free_sum}",
                self.arena.free_paragraphs()
            )));
        }
        Ok(())
    }
}

/// Checks ordering, size and membership along one chain; returns its total.
fn walk(chain: ChainIter<'_>, kind: SlotKind, name: &str) -> PoolResult<u32> {
    let mut sum = 0u32;
    let mut prev_end = 0u32;
    for (slot, chunk) in chain {
        if chunk.kind != kind {
            return Err(corrupted(format!("{name} chain holds {:?} slot {slot}", chunk.kind)));
        }
        if chunk.size == 0 {
            return Err(corrupted(format!("{name} chunk {slot} is empty")));
        }
        if chunk.offset < prev_end {
            return Err(corrupted(format!(
                "{name} chunk {slot} at paragraph {} is out of order",
                chunk.offset
            )));
        }
        prev_end = chunk.end();
        sum += chunk.size;
    }
    Ok(sum)
}

fn corrupted(message: String) -> PoolError {
    PoolError::Corrupted(message)
}
