//! Shared mutable context threaded through every noise state handler.
//!
//! `NoiseContext` is the single struct the state handlers read from and
//! write to: the current time, the rolling disturber window, the revert
//! deadline, and the noise floor writes the handlers request.  Handlers
//! never touch the sensor; the requested [`NoiseAction`]s are drained by
//! the automaton and applied after the transition is complete.

use core::time::Duration;

use heapless::{Deque, Vec};
use serde::Serialize;

use crate::clock::Timestamp;
use crate::config::NoiseSettings;

/// Most disturbers the rolling window can hold (upper bound for
/// `event_threshold`).
pub const WINDOW_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Disturber window
// ---------------------------------------------------------------------------

/// Sliding window of recent disturber timestamps.
#[derive(Debug, Clone)]
pub struct DisturberWindow {
    hits: Deque<Timestamp, WINDOW_CAPACITY>,
}

impl DisturberWindow {
    pub const fn new() -> Self {
        Self { hits: Deque::new() }
    }

    /// Drop hits older than `window`, record a new one, and return how
    /// many remain inside the window.  A hit exactly `window` old still
    /// counts.
    pub fn record(&mut self, now: Timestamp, window: Duration) -> usize {
        self.expire(now, window);
        if self.hits.is_full() {
            self.hits.pop_front();
        }
        let _ = self.hits.push_back(now);
        self.hits.len()
    }

    pub fn expire(&mut self, now: Timestamp, window: Duration) {
        while let Some(first) = self.hits.front() {
            if now.saturating_duration_since(*first) > window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn count(&self) -> usize {
        self.hits.len()
    }

    /// Hits still inside `window` as of `now`, without mutating.
    pub fn count_within(&self, now: Timestamp, window: Duration) -> usize {
        self.hits
            .iter()
            .filter(|t| now.saturating_duration_since(**t) <= window)
            .count()
    }

    /// Oldest hit still held.
    pub fn window_start(&self) -> Option<Timestamp> {
        self.hits.front().copied()
    }

    pub fn clear(&mut self) {
        self.hits.clear();
    }
}

impl Default for DisturberWindow {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Actions and reasons
// ---------------------------------------------------------------------------

/// Sensor writes requested by a state handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseAction {
    SetNoiseFloor(u8),
}

/// Why the noise floor is currently raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseReason {
    DisturberThreshold,
    PersistentNoise,
}

// ---------------------------------------------------------------------------
// NoiseContext
// ---------------------------------------------------------------------------

pub struct NoiseContext {
    pub settings: NoiseSettings,
    /// Time of the input being handled.
    pub now: Timestamp,
    pub window: DisturberWindow,
    /// Pending reversion to Normal.  At most one live deadline.
    pub revert_at: Option<Timestamp>,
    pub raised_at: Option<Timestamp>,
    pub reason: Option<NoiseReason>,
    /// Noise floor most recently requested.
    pub floor: u8,
    /// Requested sensor writes, drained after every input.
    pub actions: Vec<NoiseAction, 4>,
}

impl NoiseContext {
    pub fn new(settings: NoiseSettings, now: Timestamp) -> Self {
        Self {
            floor: settings.default_level,
            settings,
            now,
            window: DisturberWindow::new(),
            revert_at: None,
            raised_at: None,
            reason: None,
            actions: Vec::new(),
        }
    }

    pub fn request_floor(&mut self, level: u8) {
        self.floor = level;
        let _ = self.actions.push(NoiseAction::SetNoiseFloor(level));
    }

    /// Replace the revert deadline with `now + revert_delay`.
    pub fn arm_revert(&mut self) {
        self.revert_at = Some(self.now + self.settings.revert_delay);
    }

    pub fn revert_due(&self) -> bool {
        self.revert_at.is_some_and(|at| at <= self.now)
    }

    /// Back to rest: default floor, empty window, nothing pending.
    pub fn restore_default(&mut self) {
        self.request_floor(self.settings.default_level);
        self.window.clear();
        self.revert_at = None;
        self.raised_at = None;
        self.reason = None;
    }
}
