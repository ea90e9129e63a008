//! # Clocks
//!
//! The accounting core reads time for exactly three things: which issuance
//! day it is, whether the rate feed may update again, and how long a
//! withdrawal ticket waited. All three go through [`Clock`] so tests and
//! the scenario simulator can move time by hand.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::config::SECONDS_PER_DAY;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// The current instant, UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Starts the clock at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Starts the clock at the given Unix timestamp (seconds).
    /// Out-of-range timestamps fall back to the Unix epoch.
    pub fn at_unix(secs: i64) -> Self {
        Self::new(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Jumps to `to`. Going backwards is allowed; callers own the consequences.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Index of the UTC day containing `at`, counted from the Unix epoch.
pub fn day_index(at: DateTime<Utc>) -> i64 {
    at.timestamp().div_euclid(SECONDS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::at_unix(1_000);
        assert_eq!(clock.now().timestamp(), 1_000);
        clock.advance(Duration::seconds(30));
        assert_eq!(clock.now().timestamp(), 1_030);
        clock.set(DateTime::from_timestamp(5, 0).unwrap());
        assert_eq!(clock.now().timestamp(), 5);
    }

    #[test]
    fn day_index_rolls_at_midnight_utc() {
        let last_second = DateTime::from_timestamp(SECONDS_PER_DAY - 1, 0).unwrap();
        let midnight = DateTime::from_timestamp(SECONDS_PER_DAY, 0).unwrap();
        assert_eq!(day_index(last_second), 0);
        assert_eq!(day_index(midnight), 1);
    }

    #[test]
    fn system_clock_is_close_to_now() {
        let delta = Utc::now() - SystemClock.now();
        assert!(delta.num_seconds().abs() < 5);
    }
}
