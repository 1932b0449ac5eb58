//! Mock adapters for integration tests.
//!
//! Records every sensor write and every outbound message so tests can
//! assert on the full history without real SPI or a chat endpoint.

use core::time::Duration;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use stormwatch::app::ports::{NotificationChannel, SensorPort};
use stormwatch::clock::Timestamp;
use stormwatch::config::{Settings, SystemConfig};
use stormwatch::error::{BusError, NotifyError, SensorFault};
use stormwatch::fsm::NoiseState;
use stormwatch::notify::OutboundMessage;
use stormwatch::sensors::{Distance, Interrupt};
use stormwatch::status::StatusStore;

// ── Sensor ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum SensorCall {
    Initialize,
    ReadInterrupt,
    SetNoiseFloor(u8),
    Reset,
}

/// Scripted sensor.  Interrupt reads pop from `script`; an empty script
/// reads as "nothing pending".
#[derive(Default)]
pub struct MockSensor {
    pub script: VecDeque<Result<Option<Interrupt>, SensorFault>>,
    pub calls: Vec<SensorCall>,
    /// Upcoming `initialize` / `reset` calls that fail.
    pub init_failures: u32,
}

#[allow(dead_code)]
impl MockSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, irq: Interrupt) {
        self.script.push_back(Ok(Some(irq)));
    }

    pub fn push_strike(&mut self, km: u8, energy: u32) {
        self.push(Interrupt::Strike {
            distance: Distance::Km(km),
            energy,
        });
    }

    pub fn push_fault(&mut self) {
        self.script
            .push_back(Err(SensorFault::Bus(BusError::Transfer)));
    }

    pub fn floors(&self) -> Vec<u8> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SensorCall::SetNoiseFloor(level) => Some(*level),
                _ => None,
            })
            .collect()
    }

    fn init_result(&mut self) -> Result<(), SensorFault> {
        if self.init_failures > 0 {
            self.init_failures -= 1;
            return Err(SensorFault::Bus(BusError::Transfer));
        }
        Ok(())
    }
}

impl SensorPort for MockSensor {
    fn initialize(&mut self) -> Result<(), SensorFault> {
        self.calls.push(SensorCall::Initialize);
        self.init_result()
    }

    fn read_interrupt(&mut self) -> Result<Option<Interrupt>, SensorFault> {
        self.calls.push(SensorCall::ReadInterrupt);
        self.script.pop_front().unwrap_or(Ok(None))
    }

    fn set_noise_floor(&mut self, level: u8) -> Result<(), SensorFault> {
        self.calls.push(SensorCall::SetNoiseFloor(level));
        Ok(())
    }

    fn reset(&mut self) -> Result<(), SensorFault> {
        self.calls.push(SensorCall::Reset);
        self.init_result()
    }
}

// ── Notification channel ──────────────────────────────────────

/// Channel that records every delivered message.  The first
/// `fail_first` sends fail with a transport error.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    pub sent: Arc<Mutex<Vec<OutboundMessage>>>,
    pub fail_first: Arc<Mutex<u32>>,
}

#[allow(dead_code)]
impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.text.clone()).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.sent.lock().iter().any(|m| m.text.contains(needle))
    }

    pub fn count(&self, needle: &str) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.text.contains(needle))
            .count()
    }
}

impl NotificationChannel for RecordingChannel {
    fn send(&mut self, message: &OutboundMessage) -> Result<(), NotifyError> {
        let mut fail = self.fail_first.lock();
        if *fail > 0 {
            *fail -= 1;
            return Err(NotifyError::Transport);
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

// ── Helpers ───────────────────────────────────────────────────

pub fn default_settings() -> Settings {
    Settings::from_config(&SystemConfig::default()).unwrap()
}

/// Settings scaled down to milliseconds for threaded tests.
#[allow(dead_code)]
pub fn fast_settings() -> Settings {
    let mut s = default_settings();
    s.zones.all_clear_after = Duration::from_millis(300);
    s.noise.revert_delay = Duration::from_millis(300);
    s.notify.retry_delay = Duration::from_millis(10);
    s.notify.rate_per_sec = 100;
    s.notify.burst = 20;
    s.debug = true;
    s
}

pub fn status_for(settings: &Settings) -> StatusStore {
    StatusStore::new(
        settings.sensor.indoor,
        NoiseState::resting(settings.noise.default_level),
    )
}

pub fn at(t0: Timestamp, secs: u64) -> Timestamp {
    t0 + Duration::from_secs(secs)
}

/// Poll `cond` every 10 ms until it holds or `timeout` passes.
#[allow(dead_code)]
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}
