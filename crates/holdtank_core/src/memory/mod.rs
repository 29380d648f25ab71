//! # Memory Management
//!
//! The holding tank: one pre-reserved arena carved into variable-size
//! chunks, doubling as an LRU cache.
//!
//! ## Design Philosophy
//!
//! All memory is reserved once at startup. During gameplay:
//! - No arena growth, ever
//! - Stale blocks are evicted on demand, oldest first
//! - Fragmentation is repaired by an explicit, in-place compaction
//!
//! ```text
//! paragraph: 0        8       16       24                      64
//!            [H|used ][H|free ][H|used ][H|free ..............]
//!             ^ used chain (doubly linked, address order)
//!                      ^ free chain (singly linked, address order)
//! ```

mod arena;
mod chain;
mod chunk;
mod compact;
mod diagnostics;
mod evict;
mod pool;

pub use arena::{Arena, Paragraph};
pub use chunk::{ChunkHandle, ChunkInfo, ChunkState, Tick};
pub use compact::{CleanupReport, Relocation};
pub use diagnostics::PoolStats;
pub use pool::MemoryPool;
