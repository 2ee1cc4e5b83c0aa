use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::time::Duration;

use parking_lot::Mutex;
use quanta::Clock;
use quanta::Instant;

use super::Limiter;
use crate::error::LimiterError;
use crate::error::Result;

/// A Sliding Window Log implementation.
///
/// Every admission records its instant. A call first discards entries that are
/// `interval` or more in the past, then admits if fewer than `limit` remain.
/// Unlike [`FixedWindow`] this never admits more than `limit` operations in any
/// trailing `interval`, at the cost of storing up to `limit` timestamps.
///
/// Compaction and the capacity check run under the same lock, so callers only
/// ever observe a fully compacted log.
///
/// [`FixedWindow`]: crate::FixedWindow
#[derive(Debug)]
pub struct SlidingWindow {
    limit: usize,
    interval: Duration,
    /// Admission instants, oldest first
    log: Mutex<VecDeque<Instant>>,
    clock: Clock,
}

impl SlidingWindow {
    pub fn new(limit: NonZeroUsize, interval: Duration) -> Result<Self> {
        Self::with_clock(limit, interval, Clock::new())
    }

    pub fn with_clock(limit: NonZeroUsize, interval: Duration, clock: Clock) -> Result<Self> {
        if interval.is_zero() {
            return Err(LimiterError::ZeroDuration { name: "interval" });
        }
        Ok(Self {
            limit: limit.get(),
            interval,
            log: Mutex::new(VecDeque::with_capacity(limit.get())),
            clock,
        })
    }

    /// Number of admissions currently retained in the log.
    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Limiter for SlidingWindow {
    #[inline]
    fn allow(&self) -> bool {
        let now = self.clock.now();
        let mut log = self.log.lock();

        // Entries at or before `now - interval` have left the window
        while let Some(oldest) = log.front() {
            if now.saturating_duration_since(*oldest) >= self.interval {
                log.pop_front();
            } else {
                break;
            }
        }

        if log.len() < self.limit {
            log.push_back(now);
            true
        } else {
            false
        }
    }
}
