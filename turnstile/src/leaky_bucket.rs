use std::num::NonZeroUsize;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio::time::interval_at;

use super::Limiter;
use crate::error::LimiterError;
use crate::error::Result;
use crate::error::validate_rate;

/// A bounded queue drained at a constant cadence.
///
/// [`Limiter::allow`] tries to place a slot in a queue of `capacity` slots and
/// fails immediately when the queue is full; it never waits for the drain. A
/// background task, owned by this limiter, removes at most one slot every
/// `1 / drain_rate_per_second`, so the long-run admission rate converges to the
/// drain rate while up to `capacity` operations can be admitted back to back.
///
/// The drain task starts at construction, on the current Tokio runtime (or the
/// one passed to [`LeakyBucket::with_handle`]), and stops when the limiter is
/// dropped or [`LeakyBucket::shutdown`] is called. Once stopped, the queue is
/// closed and every further call is denied.
#[derive(Debug)]
pub struct LeakyBucket {
    capacity: usize,
    drain_rate_per_second: f64,
    tick: Duration,
    queue: mpsc::Sender<()>,
    drain: Mutex<DrainHandle>,
}

#[derive(Debug, Default)]
struct DrainHandle {
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Limiter for LeakyBucket {
    fn allow(&self) -> bool {
        self.queue.try_send(()).is_ok()
    }
}

impl LeakyBucket {
    /// Creates a new `LeakyBucket`, spawning its drain task on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::NoRuntime`] when called outside a Tokio runtime,
    /// and [`LimiterError::InvalidRate`] if the rate is not positive and finite
    /// or yields a tick period too small or too large to schedule.
    pub fn new(drain_rate_per_second: f64, capacity: NonZeroUsize) -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| LimiterError::NoRuntime)?;
        Self::with_handle(drain_rate_per_second, capacity, &handle)
    }

    /// Creates a new `LeakyBucket` whose drain task runs on `handle`.
    pub fn with_handle(
        drain_rate_per_second: f64,
        capacity: NonZeroUsize,
        handle: &Handle,
    ) -> Result<Self> {
        let drain_rate_per_second = validate_rate(drain_rate_per_second)?;
        let tick = Duration::try_from_secs_f64(drain_rate_per_second.recip())
            .ok()
            .filter(|tick| !tick.is_zero())
            .ok_or(LimiterError::InvalidRate {
                rate: drain_rate_per_second,
            })?;
        if capacity.get() > Semaphore::MAX_PERMITS {
            return Err(LimiterError::CapacityTooLarge {
                capacity: capacity.get(),
                max: Semaphore::MAX_PERMITS,
            });
        }

        let (queue, slots) = mpsc::channel(capacity.get());
        let (cancel, cancelled) = oneshot::channel();

        // Entering the runtime keeps `Instant::now` consistent with its clock
        let first_tick = {
            let _guard = handle.enter();
            Instant::now().checked_add(tick)
        }
        .ok_or(LimiterError::InvalidRate {
            rate: drain_rate_per_second,
        })?;
        let task = handle.spawn(drain(slots, cancelled, first_tick, tick));
        tracing::debug!(?tick, capacity = capacity.get(), "leaky bucket drain task started");

        Ok(Self {
            capacity: capacity.get(),
            drain_rate_per_second,
            tick,
            queue,
            drain: Mutex::new(DrainHandle {
                cancel: Some(cancel),
                task: Some(task),
            }),
        })
    }

    /// Stops the drain task and waits for it to finish.
    ///
    /// No tick runs after this returns. Calling it more than once is a no-op.
    pub async fn shutdown(&self) {
        let DrainHandle { cancel, task } = std::mem::take(&mut *self.drain.lock());
        if let Some(cancel) = cancel {
            let _ = cancel.send(());
        }
        if let Some(task) = task {
            // A cancelled task reports a JoinError; either way it is gone
            let _ = task.await;
        }
    }

    /// Slots currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.capacity.saturating_sub(self.queue.capacity())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn drain_rate_per_second(&self) -> f64 {
        self.drain_rate_per_second
    }

    /// The period between two drains.
    pub fn tick(&self) -> Duration {
        self.tick
    }
}

impl Drop for LeakyBucket {
    fn drop(&mut self) {
        let drain = self.drain.get_mut();
        if let Some(cancel) = drain.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(task) = drain.task.take() {
            task.abort();
        }
    }
}

async fn drain(
    mut slots: mpsc::Receiver<()>,
    mut cancelled: oneshot::Receiver<()>,
    first_tick: Instant,
    tick: Duration,
) {
    let mut ticker = interval_at(first_tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // Fires on an explicit cancel and when the limiter is dropped
            _ = &mut cancelled => break,
            _ = ticker.tick() => match slots.try_recv() {
                Ok(()) => tracing::trace!("leaky bucket drained one slot"),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => break,
            },
        }
    }

    tracing::debug!("leaky bucket drain task stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use more_asserts::assert_ge;
    use more_asserts::assert_le;
    use tokio::time::sleep;

    use super::*;

    fn capacity(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_once_scenario() {
        let rl = LeakyBucket::new(2.0, capacity(3)).unwrap();

        assert!(rl.allow());
        assert!(rl.allow());
        assert!(rl.allow());
        assert!(!rl.allow(), "4th immediate call must be denied");
        assert_eq!(rl.queued(), 3);

        // One tick every 500ms; stop just after the first one
        sleep(Duration::from_millis(510)).await;

        assert!(rl.allow());
        assert!(!rl.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_drain_before_first_tick() {
        let rl = LeakyBucket::new(2.0, capacity(1)).unwrap();

        assert!(rl.allow());
        sleep(Duration::from_millis(499)).await;
        assert!(!rl.allow());

        sleep(Duration::from_millis(2)).await;
        assert!(rl.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_bound() {
        let rl = LeakyBucket::new(50.0, capacity(4)).unwrap();

        for _ in 0..200 {
            let _ = rl.allow();
            assert_le!(rl.queued(), rl.capacity());
            sleep(Duration::from_millis(3)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_throughput_converges_to_drain_rate() {
        let rl = LeakyBucket::new(10.0, capacity(1)).unwrap();

        // Attempt every 10ms for 10s, well above the drain rate
        let mut admitted = 0;
        for _ in 0..1_000 {
            if rl.allow() {
                admitted += 1;
            }
            sleep(Duration::from_millis(10)).await;
        }

        // 100 drains plus the initial free slot
        assert_ge!(admitted, 99);
        assert_le!(admitted, 102);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drains_at_most_one_slot_per_tick() {
        let rl = LeakyBucket::new(4.0, capacity(8)).unwrap();
        while rl.allow() {}

        sleep(Duration::from_millis(1_010)).await;
        assert_eq!(rl.queued(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_draining() {
        let rl = LeakyBucket::new(10.0, capacity(2)).unwrap();
        assert!(rl.allow());
        assert!(rl.allow());

        rl.shutdown().await;
        sleep(Duration::from_secs(5)).await;

        assert!(!rl.allow(), "a stopped bucket admits nothing");
        assert!(rl.queue.is_closed());

        // A second shutdown is harmless
        rl.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_drain_task() {
        let rl = LeakyBucket::new(10.0, capacity(2)).unwrap();
        let probe = rl.queue.clone();

        drop(rl);

        // The receiver lives in the drain task, so closure means the task is gone
        tokio::time::timeout(Duration::from_secs(1), probe.closed())
            .await
            .expect("drain task should stop when the limiter is dropped");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_respect_capacity() {
        let rl = Arc::new(LeakyBucket::new(0.01, capacity(25)).unwrap());

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let rl = Arc::clone(&rl);
                tokio::spawn(async move { rl.allow() })
            })
            .collect();

        let admitted = futures::future::join_all(handles)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(true)))
            .count();

        assert_eq!(admitted, 25);
    }

    #[test]
    fn test_requires_runtime() {
        let err = LeakyBucket::new(1.0, capacity(1)).unwrap_err();
        assert!(matches!(err, LimiterError::NoRuntime));
    }

    #[test]
    fn test_with_explicit_handle() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let rl = LeakyBucket::with_handle(1.0, capacity(1), rt.handle()).unwrap();
        assert_eq!(rl.tick(), Duration::from_secs(1));
        assert!(rl.allow());
        assert!(!rl.allow());
    }

    #[tokio::test]
    async fn test_invalid_rates_are_rejected() {
        for rate in [0.0, -2.0, f64::INFINITY, 1e300, 1e-19] {
            assert!(matches!(
                LeakyBucket::new(rate, capacity(1)),
                Err(LimiterError::InvalidRate { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_tick_past_the_clock_range_is_rejected() {
        // The tick fits in a Duration but the first deadline overflows the clock
        let err = LeakyBucket::new(1e-19, capacity(1)).unwrap_err();
        assert!(matches!(err, LimiterError::InvalidRate { rate } if rate == 1e-19));
    }
}
