//! Inbound commands to the dispatch loop.
//!
//! These represent actions requested by the outside world (API layer via
//! the monitoring controller) that must be applied inside the single
//! writer context while monitoring runs.

use crate::alerts::Zone;

/// Commands that the controller can send into the running dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Force both zones inactive and the noise automaton back to Normal.
    ResetAlerts,

    /// Synthesise a qualifying strike for the given zone (debug only).
    TestStrike(Zone),

    /// Push a test message through the notification channel.
    TestNotification,
}
