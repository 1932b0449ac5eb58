//! Notifier thread.
//!
//! Decouples chat delivery from the dispatch context: the core emits
//! intents into a bounded queue and never waits on the network.
//!
//! ```text
//!  DetectionService ──IntentSender──▶ [ Outbox ] ──▶ Notifier thread
//!                                                      │ Dispatcher
//!                                                      ▼
//!                                              NotificationChannel
//! ```
//!
//! Zone intents (alert start, all clear) may use the whole queue; status
//! changes are refused once only [`ZONE_RESERVE`] slots remain.  If even
//! the reserve is exhausted a zone intent waits up to
//! [`ZONE_SEND_TIMEOUT`] for room before it is dropped.
//!
//! On shutdown the queue is drained before the thread exits, so the
//! "monitoring stopped" message still goes out.

use core::time::Duration;
use std::sync::Arc;
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{error, info, warn};

use crate::app::events::Intent;
use crate::app::ports::{IntentSink, NotificationChannel};
use crate::config::NotifySettings;
use crate::error::ControlError;
use crate::status::NotifyStats;

use super::dispatcher::Dispatcher;

/// Depth of the intent queue between the core and the notifier.
const OUTBOX_DEPTH: usize = 32;

/// Slots only zone intents may fill.
pub const ZONE_RESERVE: usize = 8;

/// Longest the core blocks on a full queue before dropping a zone intent.
pub const ZONE_SEND_TIMEOUT: Duration = Duration::from_millis(500);

struct Outbox {
    queue: Channel<CriticalSectionRawMutex, Intent, OUTBOX_DEPTH>,
    stop: Signal<CriticalSectionRawMutex, ()>,
}

/// Cloneable producer side of the outbox.
#[derive(Clone)]
pub struct IntentSender {
    outbox: Arc<Outbox>,
    stats: Arc<NotifyStats>,
}

impl IntentSink for IntentSender {
    fn emit(&mut self, intent: Intent) {
        let queue = &self.outbox.queue;
        if intent.zone().is_none() {
            if queue.free_capacity() <= ZONE_RESERVE || queue.try_send(intent.clone()).is_err() {
                warn!("NOTIFY | outbox nearly full, dropping {:?}", intent);
                self.stats.record_dropped();
            }
            return;
        }

        let intent = match queue.try_send(intent) {
            Ok(()) => return,
            Err(TrySendError::Full(intent)) => intent,
        };
        warn!("NOTIFY | outbox full, waiting for room");
        let sent = future::block_on(future::or(
            async {
                queue.send(intent.clone()).await;
                true
            },
            async {
                async_io_mini::Timer::after(ZONE_SEND_TIMEOUT).await;
                false
            },
        ));
        if !sent {
            error!(
                "NOTIFY | outbox stuck for {}ms, zone notification lost: {:?}",
                ZONE_SEND_TIMEOUT.as_millis(),
                intent
            );
            self.stats.record_dropped();
        }
    }
}

pub struct Notifier {
    outbox: Arc<Outbox>,
    stats: Arc<NotifyStats>,
    handle: Option<JoinHandle<()>>,
}

impl Notifier {
    /// Spawn the notifier thread around `channel`.
    pub fn spawn<C>(
        channel: C,
        settings: NotifySettings,
        stats: Arc<NotifyStats>,
    ) -> Result<Self, ControlError>
    where
        C: NotificationChannel + Send + 'static,
    {
        let outbox = Arc::new(Outbox {
            queue: Channel::new(),
            stop: Signal::new(),
        });
        let dispatcher = Dispatcher::new(channel, settings, stats.clone());
        let thread_outbox = outbox.clone();
        let handle = std::thread::Builder::new()
            .name("notifier".into())
            .spawn(move || run(&thread_outbox, dispatcher))
            .map_err(|_| ControlError::SpawnFailed)?;
        Ok(Self {
            outbox,
            stats,
            handle: Some(handle),
        })
    }

    pub fn sender(&self) -> IntentSender {
        IntentSender {
            outbox: self.outbox.clone(),
            stats: self.stats.clone(),
        }
    }

    /// Deliver what is queued, then stop the thread.  Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.outbox.stop.signal(());
            if handle.join().is_err() {
                warn!("NOTIFY | notifier thread panicked");
            }
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<C: NotificationChannel>(outbox: &Outbox, mut dispatcher: Dispatcher<C>) {
    info!("NOTIFY | notifier started");
    future::block_on(async {
        loop {
            let next = future::or(async { Some(outbox.queue.receive().await) }, async {
                outbox.stop.wait().await;
                None
            })
            .await;
            match next {
                Some(intent) => {
                    dispatcher.deliver(&intent).await;
                }
                None => break,
            }
        }
        while let Ok(intent) = outbox.queue.try_receive() {
            dispatcher.deliver(&intent).await;
        }
    });
    info!("NOTIFY | notifier stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::Zone;
    use crate::app::events::StatusChange;
    use crate::clock::Timestamp;
    use crate::error::NotifyError;
    use crate::notify::format::OutboundMessage;
    use core::time::Duration;
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<String>>>);

    impl NotificationChannel for Shared {
        fn send(&mut self, message: &OutboundMessage) -> Result<(), NotifyError> {
            self.0.lock().push(message.text.clone());
            Ok(())
        }
    }

    fn detached() -> (IntentSender, Arc<Outbox>) {
        let outbox = Arc::new(Outbox {
            queue: Channel::new(),
            stop: Signal::new(),
        });
        let tx = IntentSender {
            outbox: outbox.clone(),
            stats: Arc::new(NotifyStats::default()),
        };
        (tx, outbox)
    }

    fn status() -> Intent {
        Intent::Status {
            change: StatusChange::MonitoringStarted,
            at: Timestamp::now(),
        }
    }

    fn all_clear() -> Intent {
        Intent::AllClear {
            zone: Zone::Critical,
            quiet_for: Duration::from_secs(900),
            at: Timestamp::now(),
        }
    }

    #[test]
    fn status_changes_leave_room_for_zone_intents() {
        let (mut tx, outbox) = detached();
        for _ in 0..OUTBOX_DEPTH {
            tx.emit(status());
        }
        assert_eq!(outbox.queue.len(), OUTBOX_DEPTH - ZONE_RESERVE);
        assert_eq!(tx.stats.counts().dropped, ZONE_RESERVE as u64);

        for _ in 0..ZONE_RESERVE {
            tx.emit(all_clear());
        }
        assert_eq!(outbox.queue.len(), OUTBOX_DEPTH);
        assert_eq!(tx.stats.counts().dropped, ZONE_RESERVE as u64);
    }

    #[test]
    fn zone_intent_waits_for_room() {
        let (mut tx, outbox) = detached();
        for _ in 0..OUTBOX_DEPTH {
            tx.emit(all_clear());
        }
        let consumer = outbox.clone();
        let drain = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            consumer.queue.try_receive().is_ok()
        });
        tx.emit(all_clear());
        assert!(drain.join().unwrap());
        assert_eq!(outbox.queue.len(), OUTBOX_DEPTH);
        assert_eq!(tx.stats.counts().dropped, 0);
    }

    #[test]
    fn zone_intent_dropped_after_timeout() {
        let (mut tx, outbox) = detached();
        for _ in 0..OUTBOX_DEPTH {
            tx.emit(all_clear());
        }
        let started = std::time::Instant::now();
        tx.emit(all_clear());
        assert!(started.elapsed() >= ZONE_SEND_TIMEOUT);
        assert_eq!(outbox.queue.len(), OUTBOX_DEPTH);
        assert_eq!(tx.stats.counts().dropped, 1);
    }

    #[test]
    fn shutdown_drains_queued_intents() {
        let sink = Shared::default();
        let stats = Arc::new(NotifyStats::default());
        let mut notifier = Notifier::spawn(
            sink.clone(),
            NotifySettings {
                enabled: true,
                channel: "#alerts".into(),
                max_attempts: 1,
                retry_delay: Duration::from_millis(1),
                rate_per_sec: 1000,
                burst: 1000,
            },
            stats.clone(),
        )
        .unwrap();
        let mut tx = notifier.sender();
        for change in [StatusChange::MonitoringStarted, StatusChange::MonitoringStopped] {
            tx.emit(Intent::Status {
                change,
                at: Timestamp::now(),
            });
        }
        notifier.shutdown();
        assert_eq!(
            *sink.0.lock(),
            vec![
                "Lightning monitoring started".to_string(),
                "Lightning monitoring stopped".to_string()
            ]
        );
        assert_eq!(stats.counts().sent, 2);
    }
}
