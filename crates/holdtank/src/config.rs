//! # Cache Configuration
//!
//! ```toml
//! compact_before_evict = true
//! max_evictions_per_load = 8
//!
//! [pool]
//! capacity_bytes = 262144
//! ```

use std::path::Path;

use holdtank_core::{PoolConfig, PoolError};
use serde::{Deserialize, Serialize};

use crate::error::CacheResult;

/// Configuration for an [`crate::AssetCache`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// The backing pool.
    pub pool: PoolConfig,
    /// Compact when free space suffices but is fragmented, before evicting.
    pub compact_before_evict: bool,
    /// Evictions one load may trigger; 0 means unlimited.
    pub max_evictions_per_load: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            compact_before_evict: true,
            max_evictions_per_load: 0,
        }
    }
}

impl CacheConfig {
    /// Sound sample cache preset.
    #[must_use]
    pub const fn sample_cache() -> Self {
        Self {
            pool: PoolConfig::sample_cache(),
            compact_before_evict: true,
            max_evictions_per_load: 0,
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CacheError::Pool`] wrapping
    /// [`PoolError::InvalidConfig`] on parse or range errors.
    pub fn from_toml_str(text: &str) -> CacheResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| PoolError::InvalidConfig(format!("failed to parse cache config: {e}")))?;
        config.pool.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Same as [`CacheConfig::from_toml_str`], plus unreadable files.
    pub fn load(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PoolError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// The eviction cap as an `Option`.
    #[must_use]
    pub const fn eviction_limit(&self) -> Option<usize> {
        if self.max_evictions_per_load == 0 {
            None
        } else {
            Some(self.max_evictions_per_load)
        }
    }
}
