//! Event log and shared status store.
//!
//! The dispatch context is the only writer.  API readers take a
//! [`StatusSnapshot`] under one read lock, so a snapshot never pairs a
//! freshly logged strike with a stale zone record.

use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use heapless::HistoryBuffer;
use parking_lot::RwLock;
use serde::Serialize;

use crate::alerts::{Zone, ZoneState};
use crate::clock::Timestamp;
use crate::error::SensorFault;
use crate::fsm::NoiseState;
use crate::sensors::Distance;

/// Strikes kept in memory; the oldest is evicted first.
pub const EVENT_LOG_CAPACITY: usize = 100;

// ---------------------------------------------------------------------------
// Strike events
// ---------------------------------------------------------------------------

/// One logged strike.  Distance and energy are always set together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StrikeEvent {
    pub timestamp: Timestamp,
    pub distance: Distance,
    pub energy: u32,
    /// Most severe zone whose radius contains the strike.
    pub zone_at_detection: Option<Zone>,
    /// The strike activated at least one zone.
    pub alerted: bool,
    /// Energy below threshold; alert evaluation skipped.
    pub suppressed: bool,
    /// Injected through the test-alert operation.
    pub synthetic: bool,
}

pub struct EventLog {
    ring: HistoryBuffer<StrikeEvent, EVENT_LOG_CAPACITY>,
    total: u64,
}

impl EventLog {
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuffer::new(),
            total: 0,
        }
    }

    pub fn push(&mut self, event: StrikeEvent) {
        self.ring.write(event);
        self.total += 1;
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    /// Strikes logged since start, evicted ones included.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Up to `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<StrikeEvent> {
        let mut events: Vec<StrikeEvent> = self.ring.oldest_ordered().copied().collect();
        events.reverse();
        events.truncate(limit);
        events
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Sensor health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SensorHealth {
    Healthy,
    /// Re-initialisation pending after `failures` consecutive faults.
    Degraded { failures: u32 },
    /// Retries exhausted.  Still retrying at the capped interval.
    Faulted { failures: u32 },
}

impl SensorHealth {
    pub fn is_healthy(self) -> bool {
        self == Self::Healthy
    }
}

// ---------------------------------------------------------------------------
// Notification statistics
// ---------------------------------------------------------------------------

/// Counters updated by the notifier thread.
#[derive(Debug, Default)]
pub struct NotifyStats {
    sent: AtomicU64,
    failed: AtomicU64,
    suppressed: AtomicU64,
    dropped: AtomicU64,
}

impl NotifyStats {
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Duplicate intent swallowed by per-zone dedup.
    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Intent lost to a full outbound queue.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counts(&self) -> NotifyCounts {
        NotifyCounts {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotifyCounts {
    pub sent: u64,
    pub failed: u64,
    pub suppressed: u64,
    pub dropped: u64,
}

// ---------------------------------------------------------------------------
// Status record and store
// ---------------------------------------------------------------------------

/// Everything the dispatch context publishes.
pub struct StatusRecord {
    pub running: bool,
    pub health: SensorHealth,
    pub last_fault: Option<SensorFault>,
    pub indoor: bool,
    pub noise: NoiseState,
    pub critical: ZoneState,
    pub warning: ZoneState,
    /// Time of the last interrupt read from the sensor.
    pub last_reading: Option<Timestamp>,
    pub log: EventLog,
}

impl StatusRecord {
    pub fn zone(&self, zone: Zone) -> &ZoneState {
        match zone {
            Zone::Critical => &self.critical,
            Zone::Warning => &self.warning,
        }
    }
}

#[derive(Clone)]
pub struct StatusStore {
    inner: Arc<RwLock<StatusRecord>>,
    stats: Arc<NotifyStats>,
}

impl StatusStore {
    pub fn new(indoor: bool, noise: NoiseState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StatusRecord {
                running: false,
                health: SensorHealth::Healthy,
                last_fault: None,
                indoor,
                noise,
                critical: ZoneState::default(),
                warning: ZoneState::default(),
                last_reading: None,
                log: EventLog::new(),
            })),
            stats: Arc::new(NotifyStats::default()),
        }
    }

    /// Apply `f` under the write lock.  Only the dispatch context (or the
    /// controller while no loop runs) calls this.
    pub fn update<R>(&self, f: impl FnOnce(&mut StatusRecord) -> R) -> R {
        f(&mut self.inner.write())
    }

    pub fn stats(&self) -> &Arc<NotifyStats> {
        &self.stats
    }

    /// Consistent view for the API layer with up to `limit` recent events.
    pub fn snapshot(&self, now: Timestamp, limit: usize) -> StatusSnapshot {
        let rec = self.inner.read();
        StatusSnapshot {
            version: env!("CARGO_PKG_VERSION"),
            taken_at: now,
            running: rec.running,
            sensor_health: rec.health,
            last_fault: rec.last_fault.map(|f| f.to_string()),
            indoor_mode: rec.indoor,
            last_reading: rec.last_reading,
            noise: rec.noise,
            critical: ZoneStatus::new(&rec.critical, now),
            warning: ZoneStatus::new(&rec.warning, now),
            events: rec.log.recent(limit),
            events_logged: rec.log.total(),
            notifications: self.stats.counts(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneStatus {
    pub active: bool,
    pub activated_at: Option<Timestamp>,
    pub last_qualifying_strike_at: Option<Timestamp>,
    /// `None` when inactive or while monitoring is stopped.
    pub all_clear_in_secs: Option<u64>,
}

impl ZoneStatus {
    fn new(zone: &ZoneState, now: Timestamp) -> Self {
        Self {
            active: zone.active,
            activated_at: zone.activated_at,
            last_qualifying_strike_at: zone.last_qualifying_strike_at,
            all_clear_in_secs: zone
                .all_clear_deadline
                .map(|d| d.remaining_from(now).as_secs()),
        }
    }
}

/// Read-only composite handed to the API layer.  Derived on demand.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub version: &'static str,
    pub taken_at: Timestamp,
    pub running: bool,
    pub sensor_health: SensorHealth,
    pub last_fault: Option<String>,
    pub indoor_mode: bool,
    pub last_reading: Option<Timestamp>,
    pub noise: NoiseState,
    pub critical: ZoneStatus,
    pub warning: ZoneStatus,
    /// Newest first.
    pub events: Vec<StrikeEvent>,
    pub events_logged: u64,
    pub notifications: NotifyCounts,
}

impl StatusSnapshot {
    pub fn zone(&self, zone: Zone) -> &ZoneStatus {
        match zone {
            Zone::Critical => &self.critical,
            Zone::Warning => &self.warning,
        }
    }
}
