//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DetectionService (domain)
//! ```
//!
//! Driven adapters (register bus, IRQ line, chat channel) implement these
//! traits.  The [`DetectionService`](super::service::DetectionService) and
//! the monitoring controller consume them via generics, so the domain
//! core never touches hardware or the network directly.

use crate::error::{BusError, NotifyError, SensorFault};
use crate::events::{CancelToken, EdgeWait};
use crate::notify::format::OutboundMessage;
use crate::sensors::Interrupt;

use super::events::Intent;

// ───────────────────────────────────────────────────────────────
// Register bus (driven adapter: SPI → sensor driver)
// ───────────────────────────────────────────────────────────────

/// Register-level access to the sensor.
pub trait RegisterBus {
    fn read_register(&mut self, addr: u8) -> Result<u8, BusError>;

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), BusError>;

    /// Re-open the underlying bus after a failure.
    fn reopen(&mut self) -> Result<(), BusError> {
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Interrupt line (driven adapter: GPIO → IRQ thread)
// ───────────────────────────────────────────────────────────────

/// Blocking wait on the sensor's IRQ edge.
///
/// Implementations must observe `cancel` within a bounded time so that
/// stopping the monitor never waits for the next real interrupt.
pub trait InterruptLine {
    fn wait_for_edge(&mut self, cancel: &CancelToken) -> Result<EdgeWait, BusError>;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: sensor driver → domain)
// ───────────────────────────────────────────────────────────────

/// The lightning sensor as seen by the detection core.
pub trait SensorPort {
    /// Program calibration and tuning registers.
    fn initialize(&mut self) -> Result<(), SensorFault>;

    /// Decode the cause of the interrupt that just fired.  `Ok(None)` when
    /// the register reports nothing actionable.
    fn read_interrupt(&mut self) -> Result<Option<Interrupt>, SensorFault>;

    /// Write noise floor level 0..=7.
    fn set_noise_floor(&mut self, level: u8) -> Result<(), SensorFault>;

    /// Return the sensor to default registers and re-initialise it.
    fn reset(&mut self) -> Result<(), SensorFault>;
}

// ───────────────────────────────────────────────────────────────
// Notification channel (driven adapter: domain → chat / log)
// ───────────────────────────────────────────────────────────────

/// Outbound message delivery.  One call is one delivery attempt.
pub trait NotificationChannel {
    fn send(&mut self, message: &OutboundMessage) -> Result<(), NotifyError>;
}

// ───────────────────────────────────────────────────────────────
// Intent sink (domain → notification dispatcher)
// ───────────────────────────────────────────────────────────────

/// The core emits notification [`Intent`]s through this port after every
/// state transition has been published.
pub trait IntentSink {
    fn emit(&mut self, intent: Intent);
}

impl IntentSink for Vec<Intent> {
    fn emit(&mut self, intent: Intent) {
        self.push(intent);
    }
}
