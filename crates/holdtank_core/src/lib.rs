//! # HOLDTANK Core
//!
//! A fixed-capacity memory pool that doubles as an LRU cache:
//! - Variable-size blocks carved from one arena reserved at startup
//! - Per-block recency stamps and pin states
//! - Explicit eviction of the least-recently-used unpinned block
//! - In-place compaction that never moves locked blocks
//!
//! ## Architecture Rules
//!
//! 1. **One reservation** - The arena is sized once and never grows
//! 2. **Paragraph granularity** - All bookkeeping is in 16-byte units
//! 3. **Checked handles** - Blocks are addressed by slot + generation, so a
//!    handle that outlived its block is an error, not a dangling pointer
//!
//! ## Example
//!
//! ```rust,ignore
//! use holdtank_core::{ManualClock, MemoryPool};
//!
//! let mut pool = MemoryPool::with_clock(64 * 1024, ManualClock::default())?;
//! let sample = pool.alloc(4096, 17)?;
//! pool.bytes_mut(sample)?.copy_from_slice(&decoded);
//!
//! // Out of room: drop the stalest block and retry.
//! while pool.alloc(8192, 18).is_err() {
//!     pool.free_oldest().ok_or(CacheFull)?;
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod memory;

pub use clock::{GameClock, ManualClock, TickSource};
pub use config::PoolConfig;
pub use error::{PoolError, PoolResult};
pub use memory::{
    Arena, ChunkHandle, ChunkInfo, ChunkState, CleanupReport, MemoryPool, Paragraph, PoolStats,
    Relocation, Tick,
};
