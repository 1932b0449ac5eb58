//! Host delay adapter.
//!
//! Implements the `embedded-hal` [`DelayNs`] trait with
//! `std::thread::sleep`, for the sensor driver's settle delays and the
//! polled IRQ line on Linux hosts.

use core::time::Duration;

use embedded_hal::delay::DelayNs;

#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl StdDelay {
    pub fn new() -> Self {
        Self
    }
}

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(u64::from(us)));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
