//! # turnstile
//!
//! `turnstile` provides in-process admission control: each limiter answers one
//! question per inbound operation, "may this proceed?".
//!
//! ## Algorithms
//!
//! * [`FixedWindow`]: counts admissions in a window that resets lazily. Cheapest,
//!   but a burst straddling a window edge can see close to twice the limit.
//! * [`SlidingWindow`]: keeps a log of admission instants and counts the ones
//!   inside the trailing interval. Exact, at the cost of `limit` timestamps.
//! * [`TokenBucket`]: a refillable budget that allows bursts up to its capacity
//!   and converges to a constant long-run rate.
//! * [`LeakyBucket`]: a bounded queue drained at a fixed cadence by a
//!   background task owned by the limiter.
//!
//! ## Concurrency
//!
//! The window and token bucket limiters guard their whole decision with one
//! `parking_lot::Mutex` per instance. The leaky bucket uses its bounded queue as
//! the synchronization point and never blocks the caller.
//!
//! ## Example
//!
//! ```rust
//! use std::num::NonZeroUsize;
//! use std::time::Duration;
//!
//! use turnstile::FixedWindow;
//! use turnstile::Limiter;
//!
//! let limit = NonZeroUsize::new(10).unwrap();
//! let window = FixedWindow::new(limit, Duration::from_secs(1)).unwrap();
//!
//! if window.allow() {
//!     // Request admitted
//! }
//! ```

use std::fmt::Debug;

mod config;
mod error;
mod fixed_window;
mod leaky_bucket;
mod sliding_window;
mod token_bucket;

pub use config::LimiterConfig;
pub use error::LimiterError;
pub use error::Result;
pub use fixed_window::FixedWindow;
pub use leaky_bucket::LeakyBucket;
pub use sliding_window::SlidingWindow;
pub use token_bucket::TokenBucket;

/// The admission capability shared by all algorithms.
///
/// Limiters are `Send` and `Sync` so a single instance can be shared across
/// tasks and threads via `Arc`.
pub trait Limiter: Debug + Send + Sync {
    /// Decides whether one more operation may proceed.
    ///
    /// Returns `true` when the operation is admitted. A denial is an ordinary
    /// outcome, not an error: this never blocks, fails or panics.
    fn allow(&self) -> bool;
}
