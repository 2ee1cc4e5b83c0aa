use std::num::NonZeroUsize;

use parking_lot::Mutex;
use quanta::Clock;
use quanta::Instant;

use super::Limiter;
use crate::error::Result;
use crate::error::validate_rate;

/// A refillable budget of tokens.
///
/// The bucket starts full. Each admission consumes one token and tokens are
/// credited back at `rate_per_second`, never beyond `capacity`. Bursts of up to
/// `capacity` pass immediately after an idle period, while the long-run
/// admission rate converges to `rate_per_second`.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: usize,
    rate_per_second: f64,
    state: Mutex<BucketState>,
    clock: Clock,
}

#[derive(Debug)]
struct BucketState {
    tokens: usize,
    last_refill: Instant,
}

impl Limiter for TokenBucket {
    fn allow(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();

        self.refill(&mut state, now);

        if state.tokens > 0 {
            state.tokens -= 1;
            true
        } else {
            false
        }
    }
}

impl TokenBucket {
    /// Creates a new `TokenBucket`.
    ///
    /// # Arguments
    ///
    /// * `rate_per_second` - Tokens credited per second. Must be positive and finite.
    /// * `capacity` - The maximum number of stored tokens, and the initial balance.
    pub fn new(rate_per_second: f64, capacity: NonZeroUsize) -> Result<Self> {
        Self::with_clock(rate_per_second, capacity, Clock::new())
    }

    pub fn with_clock(rate_per_second: f64, capacity: NonZeroUsize, clock: Clock) -> Result<Self> {
        let rate_per_second = validate_rate(rate_per_second)?;
        let last_refill = clock.now();
        Ok(Self {
            capacity: capacity.get(),
            rate_per_second,
            state: Mutex::new(BucketState {
                tokens: capacity.get(),
                last_refill,
            }),
            clock,
        })
    }

    /// Tokens currently available, without crediting any pending refill.
    pub fn tokens(&self) -> usize {
        self.state.lock().tokens
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn rate_per_second(&self) -> f64 {
        self.rate_per_second
    }

    // `last_refill` only moves when whole tokens are credited, so fractional
    // progress carries over to the next call.
    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        let new_tokens = (elapsed.as_secs_f64() * self.rate_per_second).floor() as usize;

        if new_tokens > 0 {
            state.tokens = state.tokens.saturating_add(new_tokens).min(self.capacity);
            state.last_refill = now;
            tracing::trace!(credited = new_tokens, tokens = state.tokens, "token bucket refill");
        }
    }
}
