//! # Chunk Chains
//!
//! The chunk metadata table and the two chains threaded through it:
//! - Free chain: singly linked, ascending address, adjacent chunks merged
//! - Used chain: doubly linked, ascending address
//!
//! Links are slot indices, never addresses, so moving a chunk's bytes
//! never leaves a dangling link behind.

use super::chunk::{ChunkHandle, ChunkState, Tick};

/// Index into the chunk table.
pub(crate) type SlotId = u32;

/// Which chain, if any, a slot belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotKind {
    /// Not describing any chunk; available for reuse.
    Vacant,
    /// Linked into the free chain.
    Free,
    /// Linked into the used chain.
    Used,
}

/// Metadata for one chunk of the arena.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Chunk {
    /// Paragraph offset of the chunk header.
    pub(crate) offset: u32,
    /// Paragraphs spanned, header included.
    pub(crate) size: u32,
    /// Next chunk in this slot's chain.
    pub(crate) next: Option<SlotId>,
    /// Previous chunk (used chain only).
    pub(crate) prev: Option<SlotId>,
    /// Caller-supplied correlation id.
    pub(crate) id: u32,
    /// Payload bytes requested at allocation.
    pub(crate) len: usize,
    /// Recency / pin state.
    pub(crate) state: ChunkState,
    /// Advanced whenever outstanding handles must stop resolving.
    pub(crate) generation: u32,
    /// Chain membership.
    pub(crate) kind: SlotKind,
}

impl Chunk {
    /// A vacant slot.
    const fn vacant() -> Self {
        Self {
            offset: 0,
            size: 0,
            next: None,
            prev: None,
            id: 0,
            len: 0,
            state: ChunkState::Timestamped(Tick(0)),
            generation: 0,
            kind: SlotKind::Vacant,
        }
    }

    /// First paragraph past the chunk.
    #[inline]
    pub(crate) const fn end(&self) -> u32 {
        self.offset + self.size
    }
}

/// Chunk metadata table with the free and used chain heads.
pub(crate) struct ChunkTable {
    /// All slots ever handed out.
    slots: Vec<Chunk>,
    /// Vacant slots, reused last-in first-out.
    vacant: Vec<SlotId>,
    /// Lowest-addressed free chunk.
    free_head: Option<SlotId>,
    /// Lowest-addressed used chunk.
    used_head: Option<SlotId>,
    /// Chunks on the used chain.
    used_count: usize,
}

impl ChunkTable {
    /// Creates an empty table with room for `capacity` slots.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            vacant: Vec::with_capacity(capacity),
            free_head: None,
            used_head: None,
            used_count: 0,
        }
    }

    #[inline]
    pub(crate) fn get(&self, slot: SlotId) -> &Chunk {
        &self.slots[slot as usize]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, slot: SlotId) -> &mut Chunk {
        &mut self.slots[slot as usize]
    }

    #[inline]
    pub(crate) const fn free_head(&self) -> Option<SlotId> {
        self.free_head
    }

    #[inline]
    pub(crate) const fn used_head(&self) -> Option<SlotId> {
        self.used_head
    }

    #[inline]
    pub(crate) const fn used_count(&self) -> usize {
        self.used_count
    }

    /// Current handle for a used slot.
    #[inline]
    pub(crate) fn handle(&self, slot: SlotId) -> ChunkHandle {
        ChunkHandle::new(slot, self.get(slot).generation)
    }

    /// Maps a handle back to its slot if the handle is still live.
    pub(crate) fn resolve(&self, handle: ChunkHandle) -> Option<SlotId> {
        let slot = handle.slot();
        let chunk = self.slots.get(slot as usize)?;
        (chunk.kind == SlotKind::Used && chunk.generation == handle.generation()).then_some(slot)
    }

    /// Iterates the free chain in address order.
    pub(crate) fn free_chain(&self) -> ChainIter<'_> {
        ChainIter {
            table: self,
            cursor: self.free_head,
        }
    }

    /// Iterates the used chain in address order.
    pub(crate) fn used_chain(&self) -> ChainIter<'_> {
        ChainIter {
            table: self,
            cursor: self.used_head,
        }
    }

    /// Takes a vacant slot (or grows the table) for a new free chunk.
    #[allow(clippy::cast_possible_truncation)]
    fn acquire(&mut self, offset: u32, size: u32) -> SlotId {
        let slot = if let Some(slot) = self.vacant.pop() {
            slot
        } else {
            // Live chunks never outnumber arena paragraphs, which fit in u32.
            self.slots.push(Chunk::vacant());
            (self.slots.len() - 1) as SlotId
        };
        let chunk = self.get_mut(slot);
        chunk.offset = offset;
        chunk.size = size;
        chunk.next = None;
        chunk.prev = None;
        chunk.id = 0;
        chunk.len = 0;
        chunk.kind = SlotKind::Free;
        slot
    }

    /// Returns a slot to the vacant pool, invalidating its handles.
    pub(crate) fn release(&mut self, slot: SlotId) {
        let chunk = self.get_mut(slot);
        chunk.kind = SlotKind::Vacant;
        chunk.next = None;
        chunk.prev = None;
        chunk.generation = chunk.generation.wrapping_add(1);
        self.vacant.push(slot);
    }

    /// Vacates every slot and empties both chains. Every handle goes stale.
    pub(crate) fn clear(&mut self) {
        self.vacant.clear();
        for (slot, chunk) in self.slots.iter_mut().enumerate().rev() {
            if chunk.kind != SlotKind::Vacant {
                chunk.generation = chunk.generation.wrapping_add(1);
            }
            *chunk = Chunk {
                generation: chunk.generation,
                ..Chunk::vacant()
            };
            #[allow(clippy::cast_possible_truncation)]
            self.vacant.push(slot as SlotId);
        }
        self.free_head = None;
        self.used_head = None;
        self.used_count = 0;
    }

    // -------------------------------------------------------------------------
    // Free chain
    // -------------------------------------------------------------------------

    /// Unlinks a free chunk. `prev` must be its predecessor on the chain.
    pub(crate) fn unlink_free(&mut self, slot: SlotId, prev: Option<SlotId>) {
        let next = self.get(slot).next;
        match prev {
            Some(prev) => self.get_mut(prev).next = next,
            None => self.free_head = next,
        }
        self.get_mut(slot).next = None;
    }

    /// Drops the whole free chain, vacating its slots.
    pub(crate) fn clear_free_chain(&mut self) {
        let mut cursor = self.free_head.take();
        while let Some(slot) = cursor {
            cursor = self.get(slot).next;
            self.release(slot);
        }
    }

    /// Inserts a span into the free chain at its address position.
    ///
    /// With `merge`, the span is folded into an address-adjacent predecessor
    /// and/or successor instead of getting its own slot. Returns the slot now
    /// describing the span, or `None` for an empty span.
    pub(crate) fn insert_free(&mut self, offset: u32, size: u32, merge: bool) -> Option<SlotId> {
        if size == 0 {
            return None;
        }

        let mut prev = None;
        let mut next = self.free_head;
        while let Some(slot) = next {
            if self.get(slot).offset >= offset {
                break;
            }
            prev = next;
            next = self.get(slot).next;
        }

        if merge {
            if let Some(p) = prev.filter(|&p| self.get(p).end() == offset) {
                self.get_mut(p).size += size;
                if let Some(n) = next.filter(|&n| self.get(p).end() == self.get(n).offset) {
                    let absorbed = *self.get(n);
                    let merged = self.get_mut(p);
                    merged.size += absorbed.size;
                    merged.next = absorbed.next;
                    self.release(n);
                }
                return Some(p);
            }
            if let Some(n) = next.filter(|&n| offset + size == self.get(n).offset) {
                let grown = self.get_mut(n);
                grown.offset = offset;
                grown.size += size;
                return Some(n);
            }
        }

        let slot = self.acquire(offset, size);
        self.get_mut(slot).next = next;
        match prev {
            Some(prev) => self.get_mut(prev).next = Some(slot),
            None => self.free_head = Some(slot),
        }
        Some(slot)
    }

    // -------------------------------------------------------------------------
    // Used chain
    // -------------------------------------------------------------------------

    /// Turns an unlinked free slot into a used chunk and links it at its
    /// address position.
    pub(crate) fn occupy(
        &mut self,
        slot: SlotId,
        size: u32,
        id: u32,
        len: usize,
        state: ChunkState,
    ) -> ChunkHandle {
        let offset = self.get(slot).offset;

        let mut prev = None;
        let mut next = self.used_head;
        while let Some(n) = next {
            if self.get(n).offset >= offset {
                break;
            }
            prev = next;
            next = self.get(n).next;
        }

        match prev {
            Some(p) => self.get_mut(p).next = Some(slot),
            None => self.used_head = Some(slot),
        }
        if let Some(n) = next {
            self.get_mut(n).prev = Some(slot);
        }

        let chunk = self.get_mut(slot);
        chunk.size = size;
        chunk.id = id;
        chunk.len = len;
        chunk.state = state;
        chunk.kind = SlotKind::Used;
        chunk.prev = prev;
        chunk.next = next;
        self.used_count += 1;
        self.handle(slot)
    }

    /// Unlinks a used chunk from the used chain.
    pub(crate) fn unlink_used(&mut self, slot: SlotId) {
        let Chunk { prev, next, .. } = *self.get(slot);
        match prev {
            Some(p) => self.get_mut(p).next = next,
            None => self.used_head = next,
        }
        if let Some(n) = next {
            self.get_mut(n).prev = prev;
        }
        let chunk = self.get_mut(slot);
        chunk.prev = None;
        chunk.next = None;
        self.used_count -= 1;
    }

    /// Records that a used chunk's bytes now start at `offset`.
    ///
    /// Chain order is untouched: compaction preserves relative order.
    pub(crate) fn relocate(&mut self, slot: SlotId, offset: u32) -> ChunkHandle {
        let chunk = self.get_mut(slot);
        chunk.offset = offset;
        chunk.generation = chunk.generation.wrapping_add(1);
        self.handle(slot)
    }
}

/// Walks one chain in address order.
pub(crate) struct ChainIter<'a> {
    table: &'a ChunkTable,
    cursor: Option<SlotId>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = (SlotId, &'a Chunk);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor?;
        let chunk = self.table.get(slot);
        self.cursor = chunk.next;
        Some((slot, chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_spans(table: &ChunkTable) -> Vec<(u32, u32)> {
        table.free_chain().map(|(_, c)| (c.offset, c.size)).collect()
    }

    #[test]
    fn test_insert_keeps_address_order() {
        let mut table = ChunkTable::with_capacity(4);
        table.insert_free(20, 4, false);
        table.insert_free(0, 4, false);
        table.insert_free(10, 4, false);
        assert_eq!(free_spans(&table), vec![(0, 4), (10, 4), (20, 4)]);
    }

    #[test]
    fn test_merge_both_neighbours() {
        let mut table = ChunkTable::with_capacity(4);
        table.insert_free(0, 4, true);
        table.insert_free(8, 4, true);
        table.insert_free(4, 4, true);
        assert_eq!(free_spans(&table), vec![(0, 12)]);
        // The absorbed successor went back to the vacant pool.
        assert_eq!(table.vacant.len(), 1);
    }

    #[test]
    fn test_merge_successor_only() {
        let mut table = ChunkTable::with_capacity(4);
        table.insert_free(8, 4, true);
        table.insert_free(2, 6, true);
        assert_eq!(free_spans(&table), vec![(2, 10)]);
    }

    #[test]
    fn test_empty_span_is_ignored() {
        let mut table = ChunkTable::with_capacity(1);
        assert!(table.insert_free(5, 0, true).is_none());
        assert!(table.free_head().is_none());
    }

    #[test]
    fn test_used_chain_links_both_ways() {
        let mut table = ChunkTable::with_capacity(4);
        let stamp = ChunkState::Timestamped(Tick(0));
        let b = table.insert_free(8, 4, false).unwrap();
        let a = table.insert_free(0, 4, false).unwrap();
        table.unlink_free(a, None);
        table.unlink_free(b, None);
        table.occupy(b, 4, 2, 10, stamp);
        table.occupy(a, 4, 1, 10, stamp);

        assert_eq!(table.used_head(), Some(a));
        assert_eq!(table.get(a).next, Some(b));
        assert_eq!(table.get(b).prev, Some(a));

        table.unlink_used(a);
        assert_eq!(table.used_head(), Some(b));
        assert_eq!(table.get(b).prev, None);
        assert_eq!(table.used_count(), 1);
    }

    #[test]
    fn test_release_invalidates_handle() {
        let mut table = ChunkTable::with_capacity(1);
        let slot = table.insert_free(0, 4, false).unwrap();
        table.unlink_free(slot, None);
        let handle = table.occupy(slot, 4, 9, 1, ChunkState::InUse);
        assert_eq!(table.resolve(handle), Some(slot));

        table.unlink_used(slot);
        table.release(slot);
        assert_eq!(table.resolve(handle), None);
    }
}
