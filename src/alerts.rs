//! Alert zone state machine.
//!
//! Two independent zones keyed by distance, each with its own all-clear
//! deadline.  The machine runs inside the dispatch context and returns
//! the transitions it took; it never sends anything itself.
//!
//! ## Zone lifecycle
//!
//! 1. A strike with `energy ≥ energy_threshold` qualifies every zone whose
//!    radius contains it (a critical-range strike qualifies both).
//! 2. Each qualifying zone records the strike time and replaces its
//!    all-clear deadline with `now + all_clear_after`.  An inactive zone
//!    activates and reports [`ZoneTransition::Activated`].
//! 3. When a deadline passes without a qualifying strike the zone goes
//!    inactive, clears its timestamps, and reports
//!    [`ZoneTransition::Cleared`].
//!
//! Low-energy and out-of-range strikes change nothing.

use core::fmt;

use heapless::Vec;
use log::{debug, info};
use serde::Serialize;

use crate::clock::Timestamp;
use crate::config::ZoneSettings;
use crate::sensors::Distance;

/// Alert severity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Warning,
    Critical,
}

impl Zone {
    /// Most severe first.
    pub const ALL: [Zone; 2] = [Zone::Critical, Zone::Warning];

    pub const fn index(self) -> usize {
        match self {
            Self::Critical => 0,
            Self::Warning => 1,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Warning => "WARNING",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-zone record.  `active` implies `activated_at` is set; inactive
/// zones carry no timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ZoneState {
    pub active: bool,
    pub activated_at: Option<Timestamp>,
    pub last_qualifying_strike_at: Option<Timestamp>,
    /// `None` while active only when timers are suspended.
    pub all_clear_deadline: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneTransition {
    Activated(Zone),
    Cleared(Zone),
}

/// Transitions produced by one input; at most one per zone.
pub type ZoneTransitions = Vec<ZoneTransition, 2>;

pub struct AlertZones {
    settings: ZoneSettings,
    zones: [ZoneState; 2],
}

impl AlertZones {
    pub fn new(settings: ZoneSettings) -> Self {
        Self {
            settings,
            zones: [ZoneState::default(); 2],
        }
    }

    pub fn state(&self, zone: Zone) -> &ZoneState {
        &self.zones[zone.index()]
    }

    fn radius(&self, zone: Zone) -> u8 {
        match zone {
            Zone::Critical => self.settings.critical_distance_km,
            Zone::Warning => self.settings.warning_distance_km,
        }
    }

    /// Most severe zone whose radius contains `distance`, regardless of
    /// energy.
    pub fn zone_for(&self, distance: Distance) -> Option<Zone> {
        let km = distance.km()?;
        Zone::ALL.into_iter().find(|z| km <= self.radius(*z))
    }

    /// Whether the strike meets `zone`'s distance bound and the energy
    /// threshold.
    pub fn qualifies(&self, zone: Zone, distance: Distance, energy: u32) -> bool {
        energy >= self.settings.energy_threshold
            && distance.km().is_some_and(|km| km <= self.radius(zone))
    }

    pub fn on_strike(&mut self, distance: Distance, energy: u32, now: Timestamp) -> ZoneTransitions {
        let mut out = ZoneTransitions::new();
        if energy < self.settings.energy_threshold {
            debug!(
                "ZONE | strike at {} below energy threshold ({} < {})",
                distance, energy, self.settings.energy_threshold
            );
            return out;
        }
        for zone in Zone::ALL {
            if !self.qualifies(zone, distance, energy) {
                continue;
            }
            let deadline = now + self.settings.all_clear_after;
            let z = &mut self.zones[zone.index()];
            z.last_qualifying_strike_at = Some(now);
            z.all_clear_deadline = Some(deadline);
            if !z.active {
                z.active = true;
                z.activated_at = Some(now);
                info!("ZONE | {} active (strike at {}, energy {})", zone, distance, energy);
                let _ = out.push(ZoneTransition::Activated(zone));
            } else {
                debug!("ZONE | {} all-clear pushed back", zone);
            }
        }
        out
    }

    /// Clear every zone whose deadline has passed.
    pub fn on_timer(&mut self, now: Timestamp) -> ZoneTransitions {
        let mut out = ZoneTransitions::new();
        for zone in Zone::ALL {
            let z = &mut self.zones[zone.index()];
            if z.active && z.all_clear_deadline.is_some_and(|d| d <= now) {
                *z = ZoneState::default();
                info!("ZONE | {} all clear", zone);
                let _ = out.push(ZoneTransition::Cleared(zone));
            }
        }
        out
    }

    /// Force both zones inactive without reporting an all-clear.
    pub fn reset(&mut self) {
        self.zones = [ZoneState::default(); 2];
    }

    /// Drop pending deadlines, keeping the active flags for inspection.
    pub fn suspend(&mut self) {
        for z in &mut self.zones {
            z.all_clear_deadline = None;
        }
    }

    /// Give every still-active zone a fresh full countdown.
    pub fn resume(&mut self, now: Timestamp) {
        let after = self.settings.all_clear_after;
        for z in self.zones.iter_mut().filter(|z| z.active) {
            z.all_clear_deadline = Some(now + after);
        }
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.zones.iter().filter_map(|z| z.all_clear_deadline).min()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use core::time::Duration;
    use proptest::prelude::*;

    const QUIET: u64 = 900;

    proptest! {
        /// Each zone emits alternating Activated / Cleared transitions, and
        /// an active zone is always exactly one quiet period past its last
        /// qualifying strike.
        #[test]
        fn transitions_alternate_per_zone(
            strikes in proptest::collection::vec((0u64..600, 1u8..64, 0u32..300_000), 1..50),
        ) {
            let t0 = Timestamp::now();
            let mut z = AlertZones::new(ZoneSettings {
                energy_threshold: 100_000,
                critical_distance_km: 10,
                warning_distance_km: 30,
                all_clear_after: Duration::from_secs(QUIET),
            });
            let mut now = t0;
            let mut last = [None::<ZoneTransition>; 2];
            let mut record = |t: ZoneTransition, last: &mut [Option<ZoneTransition>; 2]| -> Result<(), TestCaseError> {
                let zone = match t { ZoneTransition::Activated(z) | ZoneTransition::Cleared(z) => z };
                let prev = last[zone.index()];
                match t {
                    ZoneTransition::Activated(_) => prop_assert!(!matches!(prev, Some(ZoneTransition::Activated(_)))),
                    ZoneTransition::Cleared(_) => prop_assert!(matches!(prev, Some(ZoneTransition::Activated(_)))),
                }
                last[zone.index()] = Some(t);
                Ok(())
            };
            for (gap, km, energy) in strikes {
                now = now + Duration::from_secs(gap);
                for t in z.on_timer(now) {
                    record(t, &mut last)?;
                }
                for t in z.on_strike(Distance::Km(km), energy, now) {
                    record(t, &mut last)?;
                }
                for zone in Zone::ALL {
                    let s = z.state(zone);
                    if s.active {
                        let strike = s.last_qualifying_strike_at.unwrap();
                        prop_assert_eq!(s.all_clear_deadline, Some(strike + Duration::from_secs(QUIET)));
                        prop_assert!(s.activated_at.is_some());
                    } else {
                        prop_assert_eq!(*s, ZoneState::default());
                    }
                }
            }
        }
    }
}
