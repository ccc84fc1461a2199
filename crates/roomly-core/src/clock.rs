//! Injectable time source.
//!
//! Grace windows, the auto-check-in threshold and the sync rate limiter
//! all compare against "now". Taking the current time through a trait
//! keeps those comparisons testable and resettable between test cases.

use chrono::{DateTime, Duration, Utc};
use std::sync::RwLock;

/// A source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock returning a fixed, manually advanced instant.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock pinned at the given instant.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Replace the current instant.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = now;
    }

    /// Move the clock forward (or backward with a negative duration).
    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_returns_pinned_instant() {
        let t0: DateTime<Utc> = "2026-03-02T09:00:00Z".parse().unwrap();
        let clock = FixedClock::new(t0);
        assert_eq!(clock.now(), t0);
        assert_eq!(clock.now(), t0);
    }

    #[test]
    fn test_fixed_clock_advance() {
        let t0: DateTime<Utc> = "2026-03-02T09:00:00Z".parse().unwrap();
        let clock = FixedClock::new(t0);
        clock.advance(Duration::minutes(15));
        assert_eq!(clock.now(), t0 + Duration::minutes(15));
    }

    #[test]
    fn test_fixed_clock_set() {
        let t0: DateTime<Utc> = "2026-03-02T09:00:00Z".parse().unwrap();
        let t1: DateTime<Utc> = "2026-04-01T12:00:00Z".parse().unwrap();
        let clock = FixedClock::new(t0);
        clock.set(t1);
        assert_eq!(clock.now(), t1);
    }

    #[test]
    fn test_system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
