//! # Clock Abstraction
//!
//! Time sources for record and checkpoint timestamps.
//!
//! Production code uses [`SystemClock`]. Tests inject [`FixedClock`] to make
//! timestamps deterministic. The engine never uses a clock reading directly:
//! it passes every reading through [`MonotonicStamp`], so stamps never go
//! backwards even if the wall clock does.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time in milliseconds since the UNIX epoch.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current wall-clock time in milliseconds.
    fn now_ms(&self) -> i64;
}

/// Clock backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

/// Clock that always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    /// The fixed timestamp to return.
    pub timestamp: i64,
}

impl FixedClock {
    /// Creates a new fixed clock with the given timestamp.
    #[must_use]
    pub const fn new(timestamp: i64) -> Self {
        Self { timestamp }
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.timestamp
    }
}

/// High-water mark over clock readings.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicStamp {
    last: i64,
}

impl MonotonicStamp {
    /// Start from a previously observed timestamp (e.g. the newest stored record).
    #[must_use]
    pub const fn starting_at(last: i64) -> Self {
        Self { last }
    }

    /// A stamp that is never lower than any stamp returned before.
    pub fn stamp(&mut self, clock: &dyn Clock) -> i64 {
        self.last = self.last.max(clock.now_ms());
        self.last
    }

    /// A stamp strictly greater than `floor` and never lower than previous stamps.
    pub fn stamp_after(&mut self, clock: &dyn Clock, floor: i64) -> i64 {
        let candidate = self.stamp(clock).max(floor.saturating_add(1));
        self.last = candidate;
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_never_goes_back() {
        let mut stamp = MonotonicStamp::starting_at(1_000);
        assert_eq!(stamp.stamp(&FixedClock::new(500)), 1_000);
        assert_eq!(stamp.stamp(&FixedClock::new(2_000)), 2_000);
        assert_eq!(stamp.stamp(&FixedClock::new(1_500)), 2_000);
    }

    #[test]
    fn stamp_after_is_strict() {
        let mut stamp = MonotonicStamp::default();
        let clock = FixedClock::new(100);
        assert_eq!(stamp.stamp_after(&clock, 100), 101);
        assert_eq!(stamp.stamp_after(&clock, 101), 102);
        // Later plain stamps respect the bumped high-water mark.
        assert_eq!(stamp.stamp(&clock), 102);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }
}
