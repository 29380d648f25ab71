//! # Pool Configuration
//!
//! Tuning for a memory pool, loaded once at startup from TOML.
//!
//! ```toml
//! capacity_bytes = 262144
//! split_slack = 2
//! tick_shift = 4
//! debug_fill = false
//! initial_slots = 128
//! ```
//!
//! Every key is optional; missing keys take the defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CAPACITY_BYTES, DEFAULT_INITIAL_SLOTS, DEFAULT_SPLIT_SLACK, DEFAULT_TICK_SHIFT,
    MAX_TICK_SHIFT,
};
use crate::error::{PoolError, PoolResult};

/// Configuration for a [`crate::MemoryPool`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Arena size in bytes, rounded down to whole paragraphs.
    pub capacity_bytes: usize,
    /// Leftover paragraphs at or below this are granted with an allocation.
    pub split_slack: u32,
    /// Raw ticks are shifted right by this before stamping.
    pub tick_shift: u32,
    /// Fill payloads with the id's low byte on alloc and 0xFF on free.
    pub debug_fill: bool,
    /// Chunk metadata slots reserved up front.
    pub initial_slots: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            split_slack: DEFAULT_SPLIT_SLACK,
            tick_shift: DEFAULT_TICK_SHIFT,
            debug_fill: false,
            initial_slots: DEFAULT_INITIAL_SLOTS,
        }
    }
}

impl PoolConfig {
    /// Default tuning with the given arena size.
    #[must_use]
    pub fn with_capacity(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            ..Self::default()
        }
    }

    /// Sound sample cache: 256 KiB arena, metadata for a few hundred samples.
    ///
    /// Samples are locked while they play, so the slot reserve is sized for
    /// a fragmented arena rather than a compact one.
    #[must_use]
    pub const fn sample_cache() -> Self {
        Self {
            capacity_bytes: 256 * 1024,
            split_slack: DEFAULT_SPLIT_SLACK,
            tick_shift: DEFAULT_TICK_SHIFT,
            debug_fill: false,
            initial_slots: 512,
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the document does not parse or
    /// a value is out of range.
    pub fn from_toml_str(text: &str) -> PoolResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| PoolError::InvalidConfig(format!("failed to parse pool config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the file cannot be read or
    /// its contents are invalid.
    pub fn load(path: impl AsRef<Path>) -> PoolResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PoolError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// The arena size is checked when the pool is built, where a zero-sized
    /// arena is an invalid argument rather than a bad file.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] naming the offending key.
    pub fn validate(&self) -> PoolResult<()> {
        if self.tick_shift > MAX_TICK_SHIFT {
            return Err(PoolError::InvalidConfig(format!(
                "tick_shift {} exceeds {MAX_TICK_SHIFT}",
                self.tick_shift
            )));
        }
        Ok(())
    }
}
