use std::num::NonZeroUsize;
use std::time::Duration;

use parking_lot::Mutex;
use quanta::Clock;
use quanta::Instant;

use super::Limiter;
use crate::error::LimiterError;
use crate::error::Result;

/// A simple window-based limiter.
///
/// Admits up to `limit` operations per window. The window resets lazily on the
/// first call made after it has expired; there is no background timer.
///
/// This is the cheapest strategy but is susceptible to "boundary bursts":
/// close to double the limit can be admitted in a short period spanning two
/// windows. That is a known limitation of the algorithm, use [`SlidingWindow`]
/// when it matters.
///
/// [`SlidingWindow`]: crate::SlidingWindow
#[derive(Debug)]
pub struct FixedWindow {
    limit: usize,
    window: Duration,
    state: Mutex<WindowState>,
    clock: Clock,
}

#[derive(Debug)]
struct WindowState {
    count: usize,
    window_start: Instant,
}

impl Limiter for FixedWindow {
    fn allow(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if now.saturating_duration_since(state.window_start) > self.window {
            tracing::trace!(dropped = state.count, "fixed window reset");
            state.window_start = now;
            state.count = 0;
        }

        if state.count < self.limit {
            state.count += 1;
            true
        } else {
            false
        }
    }
}

impl FixedWindow {
    /// Creates a new `FixedWindow` limiter.
    ///
    /// # Arguments
    ///
    /// * `limit` - The maximum number of admissions within a single window.
    /// * `window` - The duration of the window. Must be non-zero.
    pub fn new(limit: NonZeroUsize, window: Duration) -> Result<Self> {
        Self::with_clock(limit, window, Clock::new())
    }

    /// Creates a new `FixedWindow` reading time from `clock`.
    pub fn with_clock(limit: NonZeroUsize, window: Duration, clock: Clock) -> Result<Self> {
        if window.is_zero() {
            return Err(LimiterError::ZeroDuration { name: "window" });
        }
        let window_start = clock.now();
        Ok(Self {
            limit: limit.get(),
            window,
            state: Mutex::new(WindowState {
                count: 0,
                window_start,
            }),
            clock,
        })
    }

    /// Admissions recorded in the current window.
    ///
    /// An expired window is only reset by the next [`Limiter::allow`] call, so
    /// this may report a stale count until then.
    pub fn count(&self) -> usize {
        self.state.lock().count
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
