//! Timestamps pairing a monotonic instant with wall-clock time.
//!
//! Deadlines (revert, all-clear, retry) compare the monotonic half so a
//! wall-clock step never fires or starves a timer.  The wall half is what
//! gets shown in status snapshots and notifications.

use core::cmp::Ordering;
use core::ops::Add;
use core::time::Duration;
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    mono: Instant,
    wall: DateTime<Utc>,
}

impl Timestamp {
    pub fn now() -> Self {
        Self {
            mono: Instant::now(),
            wall: Utc::now(),
        }
    }

    pub fn wall(&self) -> DateTime<Utc> {
        self.wall
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn saturating_duration_since(&self, earlier: Timestamp) -> Duration {
        self.mono.saturating_duration_since(earlier.mono)
    }

    /// Time remaining until `self`, zero once it has passed.
    pub fn remaining_from(&self, now: Timestamp) -> Duration {
        self.saturating_duration_since(now)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        let wall = TimeDelta::from_std(rhs)
            .ok()
            .and_then(|d| self.wall.checked_add_signed(d))
            .unwrap_or(self.wall);
        Timestamp {
            mono: self.mono + rhs,
            wall,
        }
    }
}

// Equality and ordering both follow the monotonic half.
impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.mono == other.mono
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.mono.cmp(&other.mono)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.wall.serialize(serializer)
    }
}
