//! Outbound notification intents.
//!
//! The [`DetectionService`](super::service::DetectionService) emits these
//! through the [`IntentSink`](super::ports::IntentSink) port once a state
//! transition has been published.  The notification dispatcher on the
//! other side renders and delivers them.

use core::time::Duration;

use crate::alerts::Zone;
use crate::clock::Timestamp;
use crate::error::SensorFault;
use crate::status::StrikeEvent;

/// Structured intents emitted by the detection core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// A zone went from inactive to active on this strike.
    AlertStart { zone: Zone, strike: StrikeEvent },

    /// A zone saw no qualifying strike for `quiet_for`.
    AllClear {
        zone: Zone,
        quiet_for: Duration,
        at: Timestamp,
    },

    /// System-level status change.
    Status { change: StatusChange, at: Timestamp },
}

impl Intent {
    /// Zone this intent is ordered against, if any.
    pub fn zone(&self) -> Option<Zone> {
        match self {
            Self::AlertStart { zone, .. } | Self::AllClear { zone, .. } => Some(*zone),
            Self::Status { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    MonitoringStarted,
    MonitoringStopped,
    /// Retries exhausted; the loop keeps retrying in the background.
    SensorFaulted { failures: u32, fault: SensorFault },
    SensorRecovered,
    /// Operator reset of zones and noise state.
    AlertsReset,
    /// Operator-requested check of the notification channel.
    TestNotification,
}
