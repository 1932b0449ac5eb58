//! Log-based notification channel.
//!
//! Implements [`NotificationChannel`] by writing each rendered message to
//! the log.  Used when chat delivery is disabled or no chat transport is
//! bound; a chat adapter would implement the same trait.

use log::{info, warn};

use crate::app::ports::NotificationChannel;
use crate::error::NotifyError;
use crate::notify::format::OutboundMessage;

/// Adapter that logs every outbound message.
#[derive(Debug, Clone, Default)]
pub struct LogChannel {
    channel: String,
}

impl LogChannel {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }
}

impl NotificationChannel for LogChannel {
    fn send(&mut self, message: &OutboundMessage) -> Result<(), NotifyError> {
        match message.zone {
            Some(zone) => warn!("ALERT | {} | {} | {}", self.channel, zone, message.text),
            None => info!("ALERT | {} | {}", self.channel, message.text),
        }
        Ok(())
    }
}
