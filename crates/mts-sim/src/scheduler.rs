//! Tick pacing and cooperative cancellation.
//!
//! One [`Scheduler::drive`] loop serves both the free-running background
//! thread (real-time pacing, no limit) and deterministic `run_ticks(n)`
//! calls (unpaced, limit `n`).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use mts_core::time::tick_period;

use crate::SimResult;

/// Longest single sleep while waiting for a deadline, so a cancellation is
/// noticed promptly even at low speedups.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

// ── CancelToken ───────────────────────────────────────────────────────────────

/// Shared cancellation flag.  Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag for the next run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ── Pacing ────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Pacing {
    /// One tick every `period`, on a fixed-rate schedule.
    RealTime { period: Duration },
    /// Back to back.
    Unpaced,
}

impl Pacing {
    /// Real-time pacing for `speedup`, or `None` if it disables
    /// free-running.
    pub fn from_speedup(speedup: i32) -> Option<Pacing> {
        tick_period(speedup).map(|period| Pacing::RealTime { period })
    }
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Scheduler {
    cancel: CancelToken,
}

impl Scheduler {
    pub fn new(cancel: CancelToken) -> Self {
        Self { cancel }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Call `step` until cancelled, until `limit` ticks ran, or until a
    /// step fails.  Returns the number of completed steps.
    ///
    /// Deadlines are measured on a monotonic clock from the start of the
    /// call; a slow tick does not shift later deadlines.
    pub fn drive(
        &self,
        pacing:   Pacing,
        limit:    Option<u64>,
        mut step: impl FnMut() -> SimResult<()>,
    ) -> SimResult<u64> {
        let start = Instant::now();
        let mut done: u64 = 0;
        let mut deadline = start;

        while !self.cancel.is_cancelled() && limit.is_none_or(|l| done < l) {
            if let Pacing::RealTime { period } = pacing {
                if !self.sleep_until(deadline) {
                    break;
                }
                deadline += period;
            }
            step()?;
            done += 1;
        }
        Ok(done)
    }

    /// Sleep in slices until `deadline`.  Returns `false` if cancelled.
    fn sleep_until(&self, deadline: Instant) -> bool {
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
