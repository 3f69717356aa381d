//! Simulation time model.
//!
//! Time is a monotonically increasing `Tick` counter (the scenario's "age").
//! One tick is one full pass over all step phases.  Wall-clock pacing is a
//! separate concern: [`tick_period`] maps the configured speedup to the delay
//! between two free-running ticks.

use std::fmt;
use std::time::Duration;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute simulation tick counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// The following tick.
    #[inline]
    pub fn next(self) -> Tick {
        Tick(self.0 + 1)
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── Pacing ────────────────────────────────────────────────────────────────────

/// Delay between two free-running ticks: `1000 / speedup` milliseconds.
///
/// Returns `None` for `speedup <= 0`, which disables free-running.
pub fn tick_period(speedup: i32) -> Option<Duration> {
    if speedup <= 0 {
        return None;
    }
    Some(Duration::from_millis(1000 / speedup as u64))
}
