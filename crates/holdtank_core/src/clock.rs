//! # Tick Sources
//!
//! Recency stamps come from a 60 Hz tick counter. The pool quantizes the
//! raw count down to 16 bits, so the counter is free to wrap.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::constants::TICKS_PER_SECOND;

/// A wrapping tick counter read by the pool whenever it stamps a chunk.
pub trait TickSource {
    /// Returns the current raw tick count.
    fn ticks(&self) -> u32;
}

impl<T: TickSource + ?Sized> TickSource for &T {
    #[inline]
    fn ticks(&self) -> u32 {
        (**self).ticks()
    }
}

impl<T: TickSource + ?Sized> TickSource for Rc<T> {
    #[inline]
    fn ticks(&self) -> u32 {
        (**self).ticks()
    }
}

/// Wall-clock tick source.
///
/// Counts fixed-duration ticks since creation, the same cadence as the
/// game loop's fixed timestep.
#[derive(Clone, Copy, Debug)]
pub struct GameClock {
    /// Time of creation.
    start: Instant,
    /// Duration of one tick.
    tick_duration: Duration,
}

impl GameClock {
    /// Creates a clock ticking at [`TICKS_PER_SECOND`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_rate(TICKS_PER_SECOND)
    }

    /// Creates a clock ticking `tick_rate` times per second.
    ///
    /// A rate of zero is treated as one tick per second.
    #[must_use]
    pub fn with_rate(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            start: Instant::now(),
            tick_duration: Duration::from_micros(1_000_000 / u64::from(tick_rate)),
        }
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for GameClock {
    #[allow(clippy::cast_possible_truncation)]
    fn ticks(&self) -> u32 {
        let per_tick = self.tick_duration.as_micros().max(1);
        // Truncation is the wraparound the stamps are built to tolerate.
        (self.start.elapsed().as_micros() / per_tick) as u32
    }
}

/// Tick source advanced by hand.
///
/// Used by deterministic simulations and tests that need to place stamps
/// at exact quanta, including across the 16-bit wrap.
#[derive(Debug, Default)]
pub struct ManualClock {
    /// Current raw tick count.
    ticks: Cell<u32>,
}

impl ManualClock {
    /// Creates a clock reading `start`.
    #[must_use]
    pub const fn new(start: u32) -> Self {
        Self {
            ticks: Cell::new(start),
        }
    }

    /// Advances the clock, wrapping at `u32::MAX`.
    #[inline]
    pub fn advance(&self, ticks: u32) {
        self.ticks.set(self.ticks.get().wrapping_add(ticks));
    }

    /// Sets the raw tick count.
    #[inline]
    pub fn set(&self, ticks: u32) {
        self.ticks.set(ticks);
    }
}

impl TickSource for ManualClock {
    #[inline]
    fn ticks(&self) -> u32 {
        self.ticks.get()
    }
}
