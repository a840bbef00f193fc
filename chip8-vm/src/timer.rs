//! Delay and sound timers.
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crate::clock::{Clock, Hz};

/// The two countdown registers.
///
/// Shared between the interpreter loop, which loads and reads them, and
/// the timer driver, which counts them down. Both are atomics so the two
/// activities can run on separate threads.
#[derive(Debug, Default)]
pub struct Timers {
    /// (DT) Delay timer that counts down to 0.
    delay: AtomicU8,
    /// (ST) Sound timer that counts down to 0. The buzzer is on while it is non-zero.
    sound: AtomicU8,
}

impl Timers {
    pub fn new() -> Self {
        Default::default()
    }

    #[inline]
    pub fn delay(&self) -> u8 {
        self.delay.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_delay(&self, value: u8) {
        self.delay.store(value, Ordering::Release);
    }

    #[inline]
    pub fn sound(&self) -> u8 {
        self.sound.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_sound(&self, value: u8) {
        self.sound.store(value, Ordering::Release);
    }

    /// Count both timers down by one, stopping at zero.
    pub fn step(&self) {
        Self::count_down(&self.delay);
        Self::count_down(&self.sound);
    }

    #[inline]
    fn count_down(timer: &AtomicU8) {
        // An Err means the timer is already at zero, which is left alone.
        let _ = timer.fetch_update(Ordering::AcqRel, Ordering::Acquire, |val| {
            val.checked_sub(1)
        });
    }

    pub fn reset(&self) {
        self.set_delay(0);
        self.set_sound(0);
    }
}

/// Background thread that steps the timers at a fixed frequency,
/// independent of the instruction cadence.
///
/// The thread is stopped and joined when the driver is dropped.
pub struct TimerDriver {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TimerDriver {
    pub fn spawn(timers: Arc<Timers>, frequency: Hz) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        let handle = thread::Builder::new()
            .name("chip8-timers".to_string())
            .spawn(move || {
                log::debug!("timer driver started at {}Hz", frequency.0);
                let mut clock = Clock::new(frequency.into());

                while !thread_stop.load(Ordering::Acquire) {
                    if clock.tick() {
                        timers.step();
                    } else {
                        thread::park_timeout(clock.remaining());
                    }
                }

                log::debug!("timer driver stopped");
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop the driver thread and wait for it to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                log::error!("timer driver thread panicked");
            }
        }
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_timers_saturate() {
        let timers = Timers::new();
        for _ in 0..10 {
            timers.step();
        }
        assert_eq!(timers.delay(), 0);
        assert_eq!(timers.sound(), 0);

        timers.set_delay(2);
        timers.set_sound(1);
        timers.step();
        assert_eq!(timers.delay(), 1);
        assert_eq!(timers.sound(), 0);
        timers.step();
        timers.step();
        assert_eq!(timers.delay(), 0);
        assert_eq!(timers.sound(), 0);
    }

    #[test]
    fn test_driver_counts_down() {
        let timers = Arc::new(Timers::new());
        timers.set_delay(255);

        let driver = TimerDriver::spawn(timers.clone(), Hz(1000)).unwrap();
        thread::sleep(Duration::from_millis(50));
        driver.stop();

        let delay = timers.delay();
        assert!(delay < 255, "delay timer was not stepped");

        // No further ticks once stopped.
        thread::sleep(Duration::from_millis(20));
        assert_eq!(timers.delay(), delay);
    }

    #[test]
    fn test_driver_reaches_zero() {
        let timers = Arc::new(Timers::new());
        timers.set_sound(3);

        let _driver = TimerDriver::spawn(timers.clone(), Hz(1000)).unwrap();
        thread::sleep(Duration::from_millis(100));

        assert_eq!(timers.sound(), 0);
    }
}
