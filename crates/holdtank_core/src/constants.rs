//! # Pool Constants
//!
//! Granularity and default tuning for the holding tank.
//!
//! **CRITICAL:** Every size in the pool is bookkept in paragraphs. Changing
//! the paragraph size changes the capacity of every configured cache.

// =============================================================================
// GRANULARITY
// =============================================================================

/// Bytes per paragraph, the unit of all size bookkeeping.
pub const PARAGRAPH_BYTES: usize = 16;

/// Paragraphs reserved at the start of every chunk for its header.
pub const HEADER_PARAGRAPHS: u32 = 1;

/// Bytes of header overhead charged to every chunk.
pub const HEADER_BYTES: usize = HEADER_PARAGRAPHS as usize * PARAGRAPH_BYTES;

// =============================================================================
// DEFAULT TUNING
// =============================================================================

/// Leftover paragraphs at or below this count are granted with the
/// allocation instead of being split off as a free chunk.
pub const DEFAULT_SPLIT_SLACK: u32 = 2;

/// Raw ticks are shifted right by this before being stored as a recency
/// stamp (16 ticks per quantum, ~4.85 hours of 16-bit horizon at 60 Hz).
pub const DEFAULT_TICK_SHIFT: u32 = 4;

/// Largest accepted tick shift. A stamp keeps the low 16 bits after shifting.
pub const MAX_TICK_SHIFT: u32 = 16;

/// Default arena size (1 MiB).
pub const DEFAULT_CAPACITY_BYTES: usize = 1024 * 1024;

/// Chunk metadata slots reserved up front.
pub const DEFAULT_INITIAL_SLOTS: usize = 64;

/// Fill byte written over freed payloads when debug fill is enabled.
pub const FREED_FILL: u8 = 0xFF;

// =============================================================================
// TIMING
// =============================================================================

/// Raw tick rate of [`crate::GameClock`] (updates per second).
pub const TICKS_PER_SECOND: u32 = 60;
