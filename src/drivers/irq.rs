//! Polled IRQ line driver.
//!
//! ## Hardware
//!
//! The AS3935 drives IRQ high when an event is latched and holds it until
//! the interrupt register is read.  The line is sampled through an
//! `embedded-hal` [`InputPin`] every poll period; an edge is reported on
//! the configured transition only, so a line held high after a missed
//! read does not fire twice.
//!
//! The cancel token is checked before every sample, which bounds stop
//! latency to one poll period.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;

use crate::app::ports::InterruptLine;
use crate::error::BusError;
use crate::events::{CancelToken, EdgeWait};

/// Default sampling period.
pub const DEFAULT_POLL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

impl Edge {
    fn matches(self, previous: bool, current: bool) -> bool {
        match self {
            Self::Rising => !previous && current,
            Self::Falling => previous && !current,
        }
    }
}

pub struct PolledIrqPin<P, D> {
    pin: P,
    delay: D,
    edge: Edge,
    poll: Duration,
    /// Level seen on the previous sample.  `None` until the first one.
    last: Option<bool>,
}

impl<P: InputPin, D: DelayNs> PolledIrqPin<P, D> {
    pub fn new(pin: P, delay: D) -> Self {
        Self {
            pin,
            delay,
            edge: Edge::Rising,
            poll: DEFAULT_POLL,
            last: None,
        }
    }

    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edge = edge;
        self
    }

    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }
}

impl<P: InputPin, D: DelayNs> InterruptLine for PolledIrqPin<P, D> {
    fn wait_for_edge(&mut self, cancel: &CancelToken) -> Result<EdgeWait, BusError> {
        let poll_us = self.poll.as_micros() as u32;
        loop {
            if cancel.is_cancelled() {
                return Ok(EdgeWait::Cancelled);
            }
            let level = self.pin.is_high().map_err(|_| BusError::Gpio)?;
            let previous = self.last.replace(level);
            if previous.is_some_and(|p| self.edge.matches(p, level)) {
                return Ok(EdgeWait::Fired);
            }
            self.delay.delay_us(poll_us);
        }
    }
}
