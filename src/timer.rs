//! Rollover-safe periodic timers.
//!
//! The HAL clock is a free-running `u32` millisecond counter that wraps
//! roughly every 49.7 days.  All comparisons use wrapping subtraction, so
//! an interval that straddles the wrap still measures correctly.

/// `true` iff at least `interval` ms have passed between `mark` and `now`.
///
/// Pure and total.  The caller owns `mark` and updates it on a `true`
/// result.
#[inline]
pub fn elapsed(mark: u32, interval: u32, now: u32) -> bool {
    now.wrapping_sub(mark) >= interval
}

/// A last-fired mark plus a fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTimer {
    mark: u32,
    interval: u32,
}

impl PeriodicTimer {
    /// Timer whose first period is measured from `now`.
    pub fn new(interval: u32, now: u32) -> Self {
        Self { mark: now, interval }
    }

    /// If the interval has elapsed, re-mark at `now` and return `true`.
    pub fn check(&mut self, now: u32) -> bool {
        if elapsed(self.mark, self.interval, now) {
            self.mark = now;
            true
        } else {
            false
        }
    }

    /// Restart the period at `now`.
    pub fn mark(&mut self, now: u32) {
        self.mark = now;
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn last_mark(&self) -> u32 {
        self.mark
    }
}
