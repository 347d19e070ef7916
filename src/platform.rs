//! # Platform Collaborators
//!
//! Clock, watchdog and channel consumer interfaces the link driver runs
//! against, with the implementations used by the receiver binary.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::openlrs::packet::ChannelFrame;

/// Monotonic time source and sleep primitive of the polling task
///
/// Counters wrap; elapsed times are computed with wrapping subtraction.
pub trait Clock {
    /// Microsecond counter
    fn micros(&self) -> u32;

    /// Millisecond counter
    fn millis(&self) -> u32;

    /// Block the calling task
    fn sleep_ms(&self, ms: u32);
}

/// Keep-alive serviced by the polling task
#[cfg_attr(test, mockall::automock)]
pub trait Watchdog {
    fn keep_alive(&self);
}

/// Receiver of decoded channel data
#[cfg_attr(test, mockall::automock)]
pub trait ChannelConsumer {
    /// Called synchronously from the poll loop for every channel packet
    fn update_channels(&mut self, frame: &ChannelFrame);
}

/// Wall-clock backed [`Clock`]
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn micros(&self) -> u32 {
        self.start.elapsed().as_micros() as u32
    }

    fn millis(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    fn sleep_ms(&self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

/// Manually advanced [`Clock`]; sleeping advances time instead of blocking
///
/// Clones share the same time base.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_us: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at an arbitrary counter value (e.g. just before a wrap)
    pub fn starting_at(us: u64) -> Self {
        let clock = Self::new();
        clock.now_us.store(us, Ordering::SeqCst);
        clock
    }

    pub fn advance_us(&self, us: u64) {
        self.now_us.fetch_add(us, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms * 1000);
    }
}

impl Clock for ManualClock {
    fn micros(&self) -> u32 {
        self.now_us.load(Ordering::SeqCst) as u32
    }

    fn millis(&self) -> u32 {
        (self.now_us.load(Ordering::SeqCst) / 1000) as u32
    }

    fn sleep_ms(&self, ms: u32) {
        self.advance_ms(u64::from(ms));
    }
}

/// Watchdog flag set by the radio task and collected by a supervisor
#[derive(Debug, Clone, Default)]
pub struct WatchdogFlag {
    flag: Arc<AtomicBool>,
}

impl WatchdogFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the flag, returning whether it was set since the last check
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}

impl Watchdog for WatchdogFlag {
    fn keep_alive(&self) {
        self.flag.store(true, Ordering::Release);
    }
}
