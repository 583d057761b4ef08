//! [`IntervalTimer`] – fixed-interval trigger on the simulation clock.
//!
//! Fires on the first poll at or after each due time.  The first due time is
//! zero, so the timer fires on the very first poll.  If the caller falls more
//! than one interval behind, missed firings are collapsed into one.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use navlink_runtime::timer::IntervalTimer;
//!
//! let mut timer = IntervalTimer::new(Duration::from_millis(500));
//! assert!(timer.poll(Duration::ZERO));
//! assert!(!timer.poll(Duration::from_millis(100)));
//! assert!(timer.poll(Duration::from_millis(500)));
//! ```

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct IntervalTimer {
    interval: Duration,
    next_due: Duration,
}

impl IntervalTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: Duration::ZERO,
        }
    }

    /// Returns `true` when the timer is due at `now` and schedules the next
    /// firing.
    pub fn poll(&mut self, now: Duration) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due += self.interval;
        if self.next_due <= now {
            self.next_due = now + self.interval;
        }
        true
    }
}
