//! # Compaction
//!
//! Slides movable blocks toward the start of the arena, in their original
//! order, leaving one free chunk at the tail.
//!
//! ```text
//! before: [A][ free ][B][ free ][L][ free ][C][ free ]
//! after:  [A][B][ free ]        [L][C][ free ........]
//!                                ^ locked: stays put, the gap before it
//!                                  remains a free chunk
//! ```
//!
//! The write cursor starts at the lowest free paragraph; the used chain is
//! the read cursor. Because both chains are address ordered, everything
//! between the write cursor and the next used block is free.

use super::chunk::{ChunkHandle, ChunkState};
use super::pool::MemoryPool;
use crate::clock::TickSource;

/// One block moved by [`MemoryPool::cleanup`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Relocation {
    /// Id of the moved block.
    pub id: u32,
    /// Handle before the move (now stale).
    pub from: ChunkHandle,
    /// Handle after the move.
    pub to: ChunkHandle,
}

/// What a compaction pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Every block that moved, in address order.
    pub relocations: Vec<Relocation>,
    /// Paragraphs copied.
    pub paragraphs_moved: u32,
}

impl CleanupReport {
    /// Number of blocks moved.
    #[inline]
    #[must_use]
    pub fn moved(&self) -> usize {
        self.relocations.len()
    }

    /// Whether nothing moved.
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.relocations.is_empty()
    }

    /// The replacement for a handle invalidated by this pass.
    #[must_use]
    pub fn relocated(&self, from: ChunkHandle) -> Option<ChunkHandle> {
        self.relocations
            .iter()
            .find(|relocation| relocation.from == from)
            .map(|relocation| relocation.to)
    }
}

impl<C: TickSource> MemoryPool<C> {
    /// Defragments the arena in place.
    ///
    /// Movable blocks are copied toward the front in address order; locked
    /// blocks stay where they are and the gaps before them stay free. Every
    /// moved block gets a new handle (listed in the report) and its old
    /// handle goes stale. Blocks that did not move keep their handles, so a
    /// second pass in a row moves nothing.
    ///
    /// This copies payload bytes and is O(arena). Call it when allocation
    /// fails despite [`MemoryPool::avail`] reporting enough room, not every
    /// frame.
    pub fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        let free_total = self.arena.free_paragraphs();
        let (Some(first_free), Some(first_used)) = (self.chunks.free_head(), self.chunks.used_head())
        else {
            return report;
        };
        if free_total == 0 {
            return report;
        }

        let mut write = self.chunks.get(first_free).offset;
        let mut tail = free_total;
        self.chunks.clear_free_chain();

        let mut cursor = Some(first_used);
        while let Some(slot) = cursor {
            let chunk = *self.chunks.get(slot);
            cursor = chunk.next;

            if chunk.offset < write {
                continue;
            }
            if chunk.offset == write {
                write = chunk.end();
                continue;
            }
            if chunk.state == ChunkState::Locked {
                let gap = chunk.offset - write;
                self.chunks.insert_free(write, gap, false);
                tail -= gap;
                write = chunk.end();
                continue;
            }

            let from = self.chunks.handle(slot);
            self.arena.relocate(chunk.offset, write, chunk.size);
            let to = self.chunks.relocate(slot, write);
            report.relocations.push(Relocation {
                id: chunk.id,
                from,
                to,
            });
            report.paragraphs_moved += chunk.size;
            write += chunk.size;
        }

        debug_assert_eq!(write + tail, self.arena.total_paragraphs());
        self.chunks.insert_free(write, tail, false);

        tracing::debug!(
            moved = report.moved(),
            paragraphs = report.paragraphs_moved,
            tail,
            "compaction finished"
        );
        report
    }
}
