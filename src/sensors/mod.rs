//! Sensor subsystem: the AS3935 driver and its decoded interrupt types.
//!
//! The driver turns a raw IRQ edge into an [`Interrupt`]: noise, disturber,
//! or a strike carrying distance and energy.  Everything above this layer
//! works with these types only and never touches registers.

pub mod as3935;
pub mod registers;

use serde::Serialize;

/// Decoded interrupt cause.  Produced once per IRQ edge, immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptCause {
    /// Noise level too high, the front end is saturated.
    Noise,
    /// Man-made interference rejected by the signal validation.
    Disturber,
    /// A lightning strike was detected.
    Strike,
}

/// Estimated distance to the storm front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    Km(u8),
    OutOfRange,
}

impl Distance {
    /// Kilometres, `None` when out of range.
    pub fn km(self) -> Option<u8> {
        match self {
            Self::Km(km) => Some(km),
            Self::OutOfRange => None,
        }
    }
}

impl core::fmt::Display for Distance {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Km(km) => write!(f, "{km} km"),
            Self::OutOfRange => write!(f, "out of range"),
        }
    }
}

/// One decoded sensor interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Noise,
    Disturber,
    /// Distance and energy are always read together.
    Strike { distance: Distance, energy: u32 },
}

impl Interrupt {
    pub fn cause(&self) -> InterruptCause {
        match self {
            Self::Noise => InterruptCause::Noise,
            Self::Disturber => InterruptCause::Disturber,
            Self::Strike { .. } => InterruptCause::Strike,
        }
    }
}
