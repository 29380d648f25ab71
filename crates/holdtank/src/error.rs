//! # Cache Error Types
//!
//! Failures of the id-keyed cache layered over the pool.

use holdtank_core::PoolError;
use thiserror::Error;

/// Errors that can occur in the asset cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The pool rejected an operation.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The asset could not fit even in an empty pool.
    #[error("asset {id} needs {len} bytes, pool holds at most {pool_size}")]
    TooLarge {
        /// Asset id.
        id: u32,
        /// Payload bytes requested.
        len: usize,
        /// Largest allocation an empty pool could serve.
        pool_size: usize,
    },

    /// Every evictable block is gone and the asset still does not fit.
    #[error("cache exhausted loading asset {id} ({len} bytes) after {evicted} evictions")]
    Exhausted {
        /// Asset id.
        id: u32,
        /// Payload bytes requested.
        len: usize,
        /// Blocks evicted before giving up.
        evicted: usize,
    },

    /// The loader failed to fill the payload.
    #[error("failed to load asset {id}: {reason}")]
    Load {
        /// Asset id.
        id: u32,
        /// Loader's message.
        reason: String,
    },

    /// No cached asset has this id.
    #[error("asset {0} is not cached")]
    NotCached(u32),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
