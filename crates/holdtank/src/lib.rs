//! # HOLDTANK
//!
//! An id-keyed asset cache over the holding tank allocator. Decoded
//! samples, palettes and shape tables live in one fixed-size pool; when it
//! fills, the cache compacts or evicts the least recently used asset.
//!
//! ```rust,ignore
//! use holdtank::{AssetCache, CacheConfig};
//! use holdtank_core::GameClock;
//!
//! let mut cache = AssetCache::new(&CacheConfig::sample_cache(), GameClock::new())?;
//! cache.load_with(sample_id, decoded_len, |buf| decoder.decode_into(buf))?;
//! cache.pin(sample_id)?;        // playing: do not move or evict
//! // ...
//! cache.release(sample_id)?;    // finished: evictable again
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{AssetCache, CacheStats};
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
