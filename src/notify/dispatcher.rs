//! Notification dispatcher: dedup, pacing, bounded retries.
//!
//! Intents arrive in emission order through a single FIFO, so an
//! all-clear can never overtake the alert-start of the same zone.  On
//! top of that the dispatcher keeps one flag per zone:
//!
//! - an alert-start for a zone already announced is swallowed
//! - an all-clear for a zone never announced is swallowed
//! - an operator reset forgets both zones
//!
//! Delivery is paced by a token bucket.  An exhausted bucket delays a
//! message, it never drops one.  A failed send is retried up to
//! `max_attempts` in total, then counted and logged; it never reaches
//! back into the detection core.

use core::time::Duration;
use std::sync::Arc;

use burster::Limiter;
use log::{debug, info, warn};

use crate::alerts::Zone;
use crate::app::events::{Intent, StatusChange};
use crate::app::ports::NotificationChannel;
use crate::config::NotifySettings;
use crate::error::NotifyError;
use crate::status::NotifyStats;

use super::format::{self, OutboundMessage};

/// How often an exhausted token bucket is re-checked.
const PACE_POLL: Duration = Duration::from_millis(50);

/// Result of handing one intent to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent { attempts: u32 },
    /// Duplicate or orphaned zone transition.
    Suppressed,
    Failed(NotifyError),
}

pub struct Dispatcher<C: NotificationChannel> {
    channel: C,
    settings: NotifySettings,
    limiter: burster::TokenBucket<fn() -> Duration>,
    /// Zones whose alert-start went out (or was attempted) and have not
    /// been cleared since.
    announced: [bool; 2],
    stats: Arc<NotifyStats>,
}

impl<C: NotificationChannel> Dispatcher<C> {
    pub fn new(channel: C, settings: NotifySettings, stats: Arc<NotifyStats>) -> Self {
        Self {
            limiter: burster::TokenBucket::new_with_time_provider(
                settings.rate_per_sec,
                settings.burst,
                platform_now as fn() -> Duration,
            ),
            channel,
            settings,
            announced: [false; 2],
            stats,
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn is_announced(&self, zone: Zone) -> bool {
        self.announced[zone.index()]
    }

    /// Render and send one intent.
    pub async fn deliver(&mut self, intent: &Intent) -> Delivery {
        if !self.admit(intent) {
            debug!("NOTIFY | suppressed {:?}", intent);
            self.stats.record_suppressed();
            return Delivery::Suppressed;
        }
        let message = format::render(intent, &self.settings.channel);
        let outcome = self.send_with_retry(&message).await;
        match outcome {
            Delivery::Sent { attempts } => {
                self.stats.record_sent();
                info!("NOTIFY | sent \"{}\" ({} attempt(s))", message.text, attempts);
            }
            Delivery::Failed(e) => {
                self.stats.record_failed();
                warn!("NOTIFY | giving up on \"{}\": {}", message.text, e);
            }
            Delivery::Suppressed => {}
        }
        outcome
    }

    /// Update the per-zone record and decide whether `intent` goes out.
    fn admit(&mut self, intent: &Intent) -> bool {
        match intent {
            Intent::AlertStart { zone, .. } => {
                let seen = &mut self.announced[zone.index()];
                !core::mem::replace(seen, true)
            }
            Intent::AllClear { zone, .. } => core::mem::replace(&mut self.announced[zone.index()], false),
            Intent::Status { change, .. } => {
                if *change == StatusChange::AlertsReset {
                    self.announced = [false; 2];
                }
                true
            }
        }
    }

    async fn send_with_retry(&mut self, message: &OutboundMessage) -> Delivery {
        let max = self.settings.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            while self.limiter.try_consume(1).is_err() {
                async_io_mini::Timer::after(PACE_POLL).await;
            }
            match self.channel.send(message) {
                Ok(()) => return Delivery::Sent { attempts: attempt },
                Err(e) if attempt >= max => return Delivery::Failed(e),
                Err(e) => {
                    warn!(
                        "NOTIFY | attempt {}/{} failed: {}, retrying in {}ms",
                        attempt,
                        max,
                        e,
                        self.settings.retry_delay.as_millis()
                    );
                    async_io_mini::Timer::after(self.settings.retry_delay).await;
                }
            }
        }
    }
}

// ── Platform time for rate limiter ───────────────────────────

fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}
