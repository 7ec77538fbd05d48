//! Time source for the controller.
//!
//! The shutdown sequence waits between ramp steps and reel-in polls, and
//! timed sessions compare against a deadline. Both go through [`Clock`] so
//! tests can run the whole sequence in virtual time.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source with a blocking sleep.
pub trait Clock: Send {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;

    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time from `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Clock with its origin at the moment of construction.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    #[inline]
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Default)]
struct ManualState {
    now: Duration,
    sleeps: Vec<Duration>,
}

/// Virtual clock. `sleep` returns immediately and advances time.
///
/// Clones share the same timeline, so a test can keep one handle while the
/// controller owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    /// Clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        self.inner.lock().now += duration;
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().sleeps.clone()
    }

    /// Sum of all requested sleeps.
    pub fn total_slept(&self) -> Duration {
        self.inner.lock().sleeps.iter().sum()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.inner.lock().now
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.inner.lock();
        state.now += duration;
        state.sleeps.push(duration);
    }
}
