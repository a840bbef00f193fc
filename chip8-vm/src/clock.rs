//! Software clocks.
use std::{
    thread,
    time::{Duration, Instant},
};

use crate::constants::NANOS_IN_SECOND;

/// Frequency in hertz (cycles per second)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

/// Timer to synchronize a thread with a fixed cycle interval.
///
/// When the owner yields control and time elapses until it is resumed,
/// the elapsed time is taken into account when determining the next cycle.
pub(crate) struct Clock {
    start: Instant,
    interval: Duration,
}

impl Clock {
    /// Creates a new clock with the current time as internal state.
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            start: Instant::now(),
            interval,
        }
    }

    /// Set the clock state back to zero.
    pub(crate) fn reset(&mut self) {
        self.start = Instant::now()
    }

    /// Time left until the next cycle is due.
    pub(crate) fn remaining(&self) -> Duration {
        self.interval.saturating_sub(self.start.elapsed())
    }

    /// Check without blocking whether a cycle has elapsed, and start
    /// the next one if it has.
    pub(crate) fn tick(&mut self) -> bool {
        if self.start.elapsed() >= self.interval {
            self.reset();
            true
        } else {
            false
        }
    }

    /// Block the current thread until the next clock cycle.
    pub(crate) fn wait(&mut self) {
        loop {
            if self.start.elapsed() < self.interval {
                // Sleep does not have enough resolution, and causes
                // the clock to run at 30 FPS.
                //
                // Spinning a loop causes high CPU usage and fan madness.
                //
                // Yielding in a loop is the best alternative.
                thread::yield_now();
            } else {
                // Reset back to zero, rather than trying to catch up.
                //
                // If the VM was paused for a long time, it should
                // simply continue at the next cycle running at
                // its usual speed.
                self.reset();
                return;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clock_hz() {
        let interval: Duration = Hz(60).into();
        assert_eq!(interval.as_millis(), 16);

        let unthrottled: Duration = Hz(0).into();
        assert_eq!(unthrottled, Duration::ZERO);
    }

    #[test]
    fn test_clock_tick() {
        let mut clock = Clock::new(Duration::from_millis(5));
        assert!(!clock.tick());
        assert!(clock.remaining() <= Duration::from_millis(5));

        clock.wait();
        assert!(!clock.tick());

        thread::sleep(Duration::from_millis(6));
        assert!(clock.tick());
    }
}
