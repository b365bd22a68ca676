//! Blocking delays.
//!
//! Drivers that need datasheet timing take a `&mut dyn Delay` instead of calling
//! [std::thread::sleep] directly, so the timing can be recorded or skipped in tests.

use std::fmt::Debug;
use std::thread::sleep;
use std::time::Duration;

pub trait Delay: Debug {
    /// Blocks for at least the given duration.
    fn delay(&mut self, duration: Duration);

    /// Blocks for at least the given amount of milliseconds.
    fn delay_ms(&mut self, ms: u32) {
        self.delay(Duration::from_millis(ms as u64));
    }

    /// Blocks for at least the given amount of microseconds.
    fn delay_us(&mut self, us: u32) {
        self.delay(Duration::from_micros(us as u64));
    }
}

/// [Delay] backed by [std::thread::sleep].
///
/// The OS may oversleep, but never undersleeps, which is all the LCD timing needs.
#[derive(Debug, Default, Copy, Clone)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&mut self, duration: Duration) {
        if !duration.is_zero() {
            sleep(duration);
        }
    }
}
