/// Wall clock source used for latency measurement
///
/// Latency is "now" minus the relay's `local_time_ns`, so the clock must be
/// the same epoch-based wall clock the relay stamps with. Feeds take it as a
/// type parameter so tests can pin the time.

use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock {
    /// Nanoseconds since the Unix epoch
    fn now_ns(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> i64 {
        // A clock before 1970 reads as 0
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ns(&self) -> i64 {
        (**self).now_ns()
    }
}
