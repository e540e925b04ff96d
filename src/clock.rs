//! Clock sources for the session core.
//!
//! Every time-dependent operation in this crate has an `*_at(now)` form so
//! tests and replays can drive time explicitly. The plain forms read the
//! session's injected [`Clock`].

#[cfg(test)]
#[path = "clock_test.rs"]
mod clock_test;

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, with sub-second precision.
pub type Timestamp = f64;

/// Supplies "now" to the session core.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by [`SystemTime`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        // A system clock set before 1970 reads as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64())
    }
}

/// Settable clock with millisecond resolution.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    #[must_use]
    pub fn new(now: Timestamp) -> Self {
        Self { millis: AtomicI64::new(to_millis(now)) }
    }

    pub fn set(&self, now: Timestamp) {
        self.millis.store(to_millis(now), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let delta = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    #[allow(clippy::cast_precision_loss)]
    fn now(&self) -> Timestamp {
        self.millis.load(Ordering::SeqCst) as f64 / 1000.0
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_millis(seconds: Timestamp) -> i64 {
    (seconds * 1000.0).round() as i64
}
