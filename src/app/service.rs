//! Detection service: the hexagonal core.
//!
//! [`DetectionService`] owns the noise automaton, the alert zones, and the
//! sensor fault supervision.  It runs inside the dispatch context only,
//! which makes it the single writer of all detection state.  All I/O
//! flows through port traits, so the whole service is testable with mock
//! adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────┐ ──▶ IntentSink
//!                 │    DetectionService      │
//!                 │  Noise · Zones · Health  │ ──▶ StatusStore
//!                 └──────────────────────────┘
//! ```
//!
//! Every input updates in-memory state first, publishes it to the status
//! store, and only then performs the side effects (noise floor writes,
//! notification intents).  A failing side effect never leaves the state
//! half-updated.

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::alerts::{AlertZones, Zone, ZoneTransition};
use crate::clock::Timestamp;
use crate::config::Settings;
use crate::error::{BusError, SensorFault};
use crate::fsm::context::NoiseAction;
use crate::fsm::{NoiseActions, NoiseAutomaton};
use crate::sensors::registers::ENERGY_MAX;
use crate::sensors::{Distance, Interrupt};
use crate::status::{SensorHealth, StatusRecord, StatusStore, StrikeEvent};

use super::commands::ControlCommand;
use super::events::{Intent, StatusChange};
use super::ports::{IntentSink, SensorPort};

/// Energy added on top of the threshold for synthetic test strikes.
const TEST_STRIKE_MARGIN: u32 = 150_000;

pub struct DetectionService<S: SensorPort> {
    sensor: S,
    settings: Arc<Settings>,
    noise: NoiseAutomaton,
    zones: AlertZones,
    status: StatusStore,
    health: SensorHealth,
    /// Consecutive sensor faults since the last successful I/O.
    failures: u32,
    last_fault: Option<SensorFault>,
    /// Next re-initialisation attempt while the sensor is unhealthy.
    retry_at: Option<Timestamp>,
}

impl<S: SensorPort> DetectionService<S> {
    /// Construct the service.  Does **not** touch the sensor; call
    /// [`start`](Self::start) next.
    pub fn new(sensor: S, settings: Arc<Settings>, status: StatusStore, now: Timestamp) -> Self {
        Self {
            noise: NoiseAutomaton::new(settings.noise, now),
            zones: AlertZones::new(settings.zones),
            sensor,
            settings,
            status,
            health: SensorHealth::Healthy,
            failures: 0,
            last_fault: None,
            retry_at: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Initialise the sensor and re-arm any deadline dropped by a
    /// previous [`stop`](Self::stop).
    pub fn start(&mut self, now: Timestamp, sink: &mut impl IntentSink) {
        self.noise.resume(now);
        self.zones.resume(now);
        self.publish(now, |r| r.running = true);
        sink.emit(Intent::Status {
            change: StatusChange::MonitoringStarted,
            at: now,
        });

        match self.bring_up() {
            Ok(()) => {
                self.failures = 0;
                self.last_fault = None;
                self.health = SensorHealth::Healthy;
                self.publish(now, |_| {});
                info!("CTRL | monitoring started");
            }
            Err(fault) => self.on_fault(fault, now, sink),
        }
    }

    /// Drop every pending deadline.  Zone and noise flags are kept for
    /// inspection.
    pub fn stop(&mut self, now: Timestamp, sink: &mut impl IntentSink) {
        self.noise.suspend();
        self.zones.suspend();
        self.retry_at = None;
        self.publish(now, |r| r.running = false);
        sink.emit(Intent::Status {
            change: StatusChange::MonitoringStopped,
            at: now,
        });
        info!("CTRL | monitoring stopped");
    }

    // ── Inputs ────────────────────────────────────────────────

    /// Read and dispatch the interrupt behind one IRQ edge.
    pub fn handle_interrupt(&mut self, now: Timestamp, sink: &mut impl IntentSink) {
        if !self.health.is_healthy() {
            debug!("SENSOR | edge ignored while sensor is {:?}", self.health);
            return;
        }
        match self.sensor.read_interrupt() {
            Err(fault) => self.on_fault(fault, now, sink),
            Ok(None) => self.publish(now, |r| r.last_reading = Some(now)),
            Ok(Some(Interrupt::Noise)) => {
                warn!("NOISE | noise level too high");
                let actions = self.noise.on_noise(now);
                self.publish(now, |r| r.last_reading = Some(now));
                self.apply(actions, now, sink);
            }
            Ok(Some(Interrupt::Disturber)) => {
                debug!("NOISE | disturber");
                let actions = self.noise.on_disturber(now);
                self.publish(now, |r| r.last_reading = Some(now));
                self.apply(actions, now, sink);
            }
            Ok(Some(Interrupt::Strike { distance, energy })) => {
                info!("SENSOR | lightning at {}, energy {}", distance, energy);
                self.record_strike(distance, energy, now, false, sink);
            }
        }
    }

    /// The IRQ line itself could not be sampled.
    pub fn handle_line_fault(&mut self, err: BusError, now: Timestamp, sink: &mut impl IntentSink) {
        if self.health.is_healthy() {
            self.on_fault(SensorFault::Bus(err), now, sink);
        }
    }

    /// Fire every deadline that has passed: noise revert, zone all-clears,
    /// sensor re-initialisation.
    pub fn handle_timers(&mut self, now: Timestamp, sink: &mut impl IntentSink) {
        let actions = self.noise.on_timer(now);
        let cleared = self.zones.on_timer(now);
        if !actions.is_empty() || !cleared.is_empty() {
            self.publish(now, |_| {});
        }
        let quiet_for = self.settings.zones.all_clear_after;
        for t in cleared {
            if let ZoneTransition::Cleared(zone) = t {
                sink.emit(Intent::AllClear {
                    zone,
                    quiet_for,
                    at: now,
                });
            }
        }
        if self.health.is_healthy() {
            self.apply(actions, now, sink);
        }
        if self.retry_at.is_some_and(|at| at <= now) {
            self.attempt_recovery(now, sink);
        }
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        [
            self.noise.revert_deadline(),
            self.zones.next_deadline(),
            self.retry_at,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // ── Operator commands ─────────────────────────────────────

    pub fn handle_command(&mut self, cmd: ControlCommand, now: Timestamp, sink: &mut impl IntentSink) {
        match cmd {
            ControlCommand::ResetAlerts => self.reset(now, sink),
            ControlCommand::TestStrike(zone) => {
                self.test_strike(zone, now, sink);
            }
            ControlCommand::TestNotification => {
                info!("CTRL | test notification requested");
                sink.emit(Intent::Status {
                    change: StatusChange::TestNotification,
                    at: now,
                });
            }
        }
    }

    /// Force both zones inactive and the noise automaton back to Normal.
    /// The event log is kept.
    pub fn reset(&mut self, now: Timestamp, sink: &mut impl IntentSink) {
        let actions = self.noise.reset(now);
        self.zones.reset();
        self.publish(now, |_| {});
        sink.emit(Intent::Status {
            change: StatusChange::AlertsReset,
            at: now,
        });
        info!("CTRL | alerts and noise state reset by operator");
        if self.health.is_healthy() {
            self.apply(actions, now, sink);
        }
    }

    /// Synthesise a strike that qualifies for `zone`.
    pub fn test_strike(&mut self, zone: Zone, now: Timestamp, sink: &mut impl IntentSink) -> StrikeEvent {
        let z = &self.settings.zones;
        let km = match zone {
            Zone::Critical => z.critical_distance_km.saturating_sub(2).max(1),
            Zone::Warning => {
                z.warning_distance_km - (z.warning_distance_km - z.critical_distance_km) / 2
            }
        };
        let energy = z.energy_threshold.saturating_add(TEST_STRIKE_MARGIN).min(ENERGY_MAX);
        info!("CTRL | test {} strike at {} km", zone, km);
        self.record_strike(Distance::Km(km), energy, now, true, sink)
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn health(&self) -> SensorHealth {
        self.health
    }

    pub fn noise(&self) -> &NoiseAutomaton {
        &self.noise
    }

    pub fn zones(&self) -> &AlertZones {
        &self.zones
    }

    pub fn status(&self) -> &StatusStore {
        &self.status
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    // ── Internal ──────────────────────────────────────────────

    fn record_strike(
        &mut self,
        distance: Distance,
        energy: u32,
        now: Timestamp,
        synthetic: bool,
        sink: &mut impl IntentSink,
    ) -> StrikeEvent {
        let transitions = self.zones.on_strike(distance, energy, now);
        let event = StrikeEvent {
            timestamp: now,
            distance,
            energy,
            zone_at_detection: self.zones.zone_for(distance),
            alerted: !transitions.is_empty(),
            suppressed: energy < self.settings.zones.energy_threshold,
            synthetic,
        };
        self.publish(now, |r| {
            r.log.push(event);
            if !synthetic {
                r.last_reading = Some(now);
            }
        });
        for t in transitions {
            if let ZoneTransition::Activated(zone) = t {
                sink.emit(Intent::AlertStart {
                    zone,
                    strike: event,
                });
            }
        }
        event
    }

    /// Perform the noise floor writes requested by the automaton.
    fn apply(&mut self, actions: NoiseActions, now: Timestamp, sink: &mut impl IntentSink) {
        for action in actions {
            let NoiseAction::SetNoiseFloor(level) = action;
            if let Err(fault) = self.sensor.set_noise_floor(level) {
                error!("NOISE | noise floor {} not applied: {}", level, fault);
                self.on_fault(fault, now, sink);
                return;
            }
        }
    }

    /// Initialise the sensor and restore the commanded noise floor if the
    /// automaton is still raised.
    fn bring_up(&mut self) -> Result<(), SensorFault> {
        self.sensor.initialize()?;
        let floor = self.noise.commanded_floor();
        if floor != self.settings.sensor.noise_floor {
            self.sensor.set_noise_floor(floor)?;
        }
        Ok(())
    }

    fn on_fault(&mut self, fault: SensorFault, now: Timestamp, sink: &mut impl IntentSink) {
        self.failures = self.failures.saturating_add(1);
        self.last_fault = Some(fault);
        let backoff = self.settings.retry.backoff(self.failures);
        self.retry_at = Some(now + backoff);

        let newly_faulted = match self.health {
            SensorHealth::Faulted { .. } => {
                self.health = SensorHealth::Faulted {
                    failures: self.failures,
                };
                false
            }
            _ if self.failures >= self.settings.retry.max_retries => {
                self.health = SensorHealth::Faulted {
                    failures: self.failures,
                };
                true
            }
            _ => {
                self.health = SensorHealth::Degraded {
                    failures: self.failures,
                };
                false
            }
        };

        error!(
            "SENSOR | sensor fault #{}: {} (retry in {}s)",
            self.failures,
            fault,
            backoff.as_secs()
        );
        self.publish(now, |_| {});
        if newly_faulted {
            sink.emit(Intent::Status {
                change: StatusChange::SensorFaulted {
                    failures: self.failures,
                    fault,
                },
                at: now,
            });
        }
    }

    fn attempt_recovery(&mut self, now: Timestamp, sink: &mut impl IntentSink) {
        self.retry_at = None;
        info!("SENSOR | re-initialising sensor (attempt {})", self.failures + 1);
        let result = self.sensor.reset().and_then(|()| {
            let floor = self.noise.commanded_floor();
            if floor == self.settings.sensor.noise_floor {
                Ok(())
            } else {
                self.sensor.set_noise_floor(floor)
            }
        });
        match result {
            Ok(()) => {
                let was_faulted = matches!(self.health, SensorHealth::Faulted { .. });
                self.health = SensorHealth::Healthy;
                self.failures = 0;
                self.last_fault = None;
                self.publish(now, |_| {});
                info!("SENSOR | sensor recovered");
                if was_faulted {
                    sink.emit(Intent::Status {
                        change: StatusChange::SensorRecovered,
                        at: now,
                    });
                }
            }
            Err(fault) => self.on_fault(fault, now, sink),
        }
    }

    /// Copy the current state into the status store, plus whatever `extra`
    /// records, under one write lock.
    fn publish(&self, now: Timestamp, extra: impl FnOnce(&mut StatusRecord)) {
        let noise = self.noise.state(now);
        let critical = *self.zones.state(Zone::Critical);
        let warning = *self.zones.state(Zone::Warning);
        let health = self.health;
        let last_fault = self.last_fault;
        self.status.update(|r| {
            r.noise = noise;
            r.critical = critical;
            r.warning = warning;
            r.health = health;
            r.last_fault = last_fault;
            extra(r);
        });
    }
}
