//! # Pool Error Types
//!
//! All errors that can occur in the holding tank.

use crate::memory::ChunkHandle;
use thiserror::Error;

/// Errors that can occur in the memory pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// A size or length argument was zero or otherwise unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// No free chunk is large enough. Evict or compact, then retry.
    #[error("out of capacity: requested {requested} bytes, largest free block holds {largest}")]
    OutOfCapacity {
        /// Payload bytes requested.
        requested: usize,
        /// Payload bytes the largest free chunk could hold.
        largest: usize,
    },

    /// The handle refers to a chunk that was freed, evicted or relocated.
    #[error("stale chunk handle {0}")]
    StaleHandle(ChunkHandle),

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An integrity check found a broken invariant.
    #[error("pool corrupted: {0}")]
    Corrupted(String),
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
