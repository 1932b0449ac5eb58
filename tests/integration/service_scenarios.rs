//! Integration tests: DetectionService → noise automaton + alert zones →
//! sensor writes and notification intents, on a virtual clock.

use core::time::Duration;
use std::sync::Arc;

use stormwatch::alerts::Zone;
use stormwatch::app::events::{Intent, StatusChange};
use stormwatch::app::service::DetectionService;
use stormwatch::clock::Timestamp;
use stormwatch::config::Settings;
use stormwatch::fsm::NoiseLevel;
use stormwatch::fsm::context::NoiseReason;
use stormwatch::sensors::{Distance, Interrupt};
use stormwatch::status::SensorHealth;

use crate::mock_hw::{MockSensor, SensorCall, at, default_settings, status_for};

fn started(sensor: MockSensor, settings: Settings, t0: Timestamp) -> DetectionService<MockSensor> {
    let settings = Arc::new(settings);
    let status = status_for(&settings);
    let mut svc = DetectionService::new(sensor, settings, status, t0);
    let mut out = Vec::new();
    svc.start(t0, &mut out);
    assert_eq!(
        out,
        vec![Intent::Status {
            change: StatusChange::MonitoringStarted,
            at: t0
        }]
    );
    svc
}

fn alert_zones(out: &[Intent]) -> Vec<Zone> {
    out.iter()
        .filter_map(|i| match i {
            Intent::AlertStart { zone, .. } => Some(*zone),
            _ => None,
        })
        .collect()
}

fn cleared_zones(out: &[Intent]) -> Vec<Zone> {
    out.iter()
        .filter_map(|i| match i {
            Intent::AllClear { zone, .. } => Some(*zone),
            _ => None,
        })
        .collect()
}

// ── Zone lifecycle ────────────────────────────────────────────

#[test]
fn storm_passes_through_both_zones() {
    let t0 = Timestamp::now();
    let mut sensor = MockSensor::new();
    sensor.push_strike(8, 150_000);
    sensor.push_strike(25, 200_000);
    let mut svc = started(sensor, default_settings(), t0);
    let mut out = Vec::new();

    // t=0: 8 km is inside both radii.
    svc.handle_interrupt(t0, &mut out);
    assert_eq!(alert_zones(&out), vec![Zone::Critical, Zone::Warning]);
    out.clear();

    // t=500: 25 km only refreshes Warning.
    svc.handle_interrupt(at(t0, 500), &mut out);
    assert!(out.is_empty());
    assert_eq!(svc.zones().state(Zone::Warning).all_clear_deadline, Some(at(t0, 1400)));
    assert_eq!(svc.zones().state(Zone::Critical).all_clear_deadline, Some(at(t0, 900)));
    assert_eq!(svc.next_deadline(), Some(at(t0, 900)));

    svc.handle_timers(at(t0, 900), &mut out);
    assert_eq!(cleared_zones(&out), vec![Zone::Critical]);
    out.clear();

    svc.handle_timers(at(t0, 1399), &mut out);
    assert!(out.is_empty());
    assert!(svc.zones().state(Zone::Warning).active);

    svc.handle_timers(at(t0, 1400), &mut out);
    assert_eq!(cleared_zones(&out), vec![Zone::Warning]);
    assert_eq!(svc.next_deadline(), None);

    let snap = svc.status().snapshot(at(t0, 1401), 10);
    assert!(!snap.critical.active && !snap.warning.active);
    assert_eq!(snap.events.len(), 2);
    assert_eq!(snap.events[0].distance, Distance::Km(25));
    assert_eq!(snap.events[0].zone_at_detection, Some(Zone::Warning));
    assert!(!snap.events[0].alerted);
    assert!(snap.events[1].alerted);
}

#[test]
fn repeated_strikes_alert_once_per_activation() {
    let t0 = Timestamp::now();
    let mut sensor = MockSensor::new();
    for _ in 0..5 {
        sensor.push_strike(3, 300_000);
    }
    let mut svc = started(sensor, default_settings(), t0);
    let mut out = Vec::new();
    for i in 0..5 {
        svc.handle_interrupt(at(t0, i * 60), &mut out);
    }
    assert_eq!(alert_zones(&out), vec![Zone::Critical, Zone::Warning]);
    assert_eq!(
        svc.zones().state(Zone::Critical).last_qualifying_strike_at,
        Some(at(t0, 240))
    );
    assert_eq!(svc.status().snapshot(at(t0, 240), 10).events_logged, 5);
}

#[test]
fn out_of_range_and_weak_strikes_never_alert() {
    let t0 = Timestamp::now();
    let mut sensor = MockSensor::new();
    sensor.push(Interrupt::Strike {
        distance: Distance::OutOfRange,
        energy: 500_000,
    });
    sensor.push_strike(2, 99_999);
    sensor.push_strike(31, 400_000);
    let mut svc = started(sensor, default_settings(), t0);
    let mut out = Vec::new();
    for _ in 0..3 {
        svc.handle_interrupt(t0, &mut out);
    }
    assert!(out.is_empty());

    let snap = svc.status().snapshot(t0, 10);
    assert_eq!(snap.events.len(), 3);
    // Newest first: 31 km, weak 2 km, out of range.
    assert_eq!(snap.events[0].zone_at_detection, None);
    assert!(!snap.events[0].suppressed);
    assert_eq!(snap.events[1].zone_at_detection, Some(Zone::Critical));
    assert!(snap.events[1].suppressed);
    assert_eq!(snap.events[2].distance, Distance::OutOfRange);
}

#[test]
fn warning_band_strike_leaves_critical_idle() {
    let t0 = Timestamp::now();
    let mut sensor = MockSensor::new();
    sensor.push_strike(10, 100_000);
    sensor.push_strike(11, 100_000);
    let mut svc = started(sensor, default_settings(), t0);
    let mut out = Vec::new();

    // Boundaries are inclusive: 10 km at exactly the threshold is critical.
    svc.handle_interrupt(t0, &mut out);
    assert_eq!(alert_zones(&out), vec![Zone::Critical, Zone::Warning]);

    svc.reset(t0, &mut out);
    out.clear();
    svc.handle_interrupt(at(t0, 1), &mut out);
    assert_eq!(alert_zones(&out), vec![Zone::Warning]);
}

// ── Noise handling ────────────────────────────────────────────

#[test]
fn disturber_burst_raises_floor_then_reverts() {
    let t0 = Timestamp::now();
    let mut sensor = MockSensor::new();
    for _ in 0..15 {
        sensor.push(Interrupt::Disturber);
    }
    let mut svc = started(sensor, default_settings(), t0);
    let mut out = Vec::new();

    for i in 0..14 {
        svc.handle_interrupt(at(t0, i), &mut out);
    }
    assert_eq!(svc.noise().level(), NoiseLevel::Normal);
    assert!(svc.sensor().floors().is_empty());

    svc.handle_interrupt(at(t0, 14), &mut out);
    assert_eq!(svc.noise().level(), NoiseLevel::Elevated);
    assert_eq!(svc.sensor().floors(), vec![5]);
    let snap = svc.status().snapshot(at(t0, 14), 0);
    assert_eq!(snap.noise.reason, Some(NoiseReason::DisturberThreshold));
    assert_eq!(snap.noise.floor, 5);

    let revert = svc.next_deadline().unwrap();
    assert_eq!(revert, at(t0, 14 + 600));
    svc.handle_timers(revert, &mut out);
    assert_eq!(svc.noise().level(), NoiseLevel::Normal);
    assert_eq!(svc.sensor().floors(), vec![5, 2]);
    // Noise adaptation never notifies.
    assert!(out.is_empty());
}

#[test]
fn sparse_disturbers_do_not_raise_floor() {
    let t0 = Timestamp::now();
    let mut sensor = MockSensor::new();
    for _ in 0..30 {
        sensor.push(Interrupt::Disturber);
    }
    let mut svc = started(sensor, default_settings(), t0);
    let mut out = Vec::new();
    // One every 10 s keeps at most 13 inside any 120 s window.
    for i in 0..30 {
        svc.handle_interrupt(at(t0, i * 10), &mut out);
    }
    assert_eq!(svc.noise().level(), NoiseLevel::Normal);
    assert!(svc.sensor().floors().is_empty());
}

#[test]
fn noise_escalates_elevated_to_critical() {
    let t0 = Timestamp::now();
    let mut sensor = MockSensor::new();
    for _ in 0..15 {
        sensor.push(Interrupt::Disturber);
    }
    sensor.push(Interrupt::Noise);
    sensor.push(Interrupt::Disturber);
    sensor.push(Interrupt::Noise);
    let mut svc = started(sensor, default_settings(), t0);
    let mut out = Vec::new();

    for _ in 0..15 {
        svc.handle_interrupt(t0, &mut out);
    }
    svc.handle_interrupt(at(t0, 30), &mut out);
    assert_eq!(svc.noise().level(), NoiseLevel::Critical);
    assert_eq!(svc.noise().revert_deadline(), Some(at(t0, 630)));

    // Disturbers are ignored; more noise re-arms the revert.
    svc.handle_interrupt(at(t0, 60), &mut out);
    assert_eq!(svc.noise().revert_deadline(), Some(at(t0, 630)));
    svc.handle_interrupt(at(t0, 90), &mut out);
    assert_eq!(svc.noise().revert_deadline(), Some(at(t0, 690)));
    assert_eq!(svc.sensor().floors(), vec![5, 7, 7]);

    svc.handle_timers(at(t0, 630), &mut out);
    assert_eq!(svc.noise().level(), NoiseLevel::Critical);
    svc.handle_timers(at(t0, 690), &mut out);
    assert_eq!(svc.noise().level(), NoiseLevel::Normal);
    assert_eq!(svc.sensor().floors(), vec![5, 7, 7, 2]);
}

// ── Operator commands ─────────────────────────────────────────

#[test]
fn reset_clears_zones_and_noise_without_all_clear() {
    let t0 = Timestamp::now();
    let mut sensor = MockSensor::new();
    sensor.push_strike(5, 200_000);
    sensor.push(Interrupt::Noise);
    let mut svc = started(sensor, default_settings(), t0);
    let mut out = Vec::new();
    svc.handle_interrupt(t0, &mut out);
    svc.handle_interrupt(t0, &mut out);
    out.clear();

    svc.reset(at(t0, 10), &mut out);
    assert_eq!(
        out,
        vec![Intent::Status {
            change: StatusChange::AlertsReset,
            at: at(t0, 10)
        }]
    );
    assert!(!svc.zones().state(Zone::Critical).active);
    assert!(!svc.zones().state(Zone::Warning).active);
    assert_eq!(svc.noise().level(), NoiseLevel::Normal);
    assert_eq!(svc.sensor().floors().last(), Some(&2));
    assert_eq!(svc.next_deadline(), None);
    // The strike log survives a reset.
    assert_eq!(svc.status().snapshot(at(t0, 10), 10).events.len(), 1);
}

#[test]
fn test_strikes_land_in_the_requested_zone() {
    let t0 = Timestamp::now();
    let mut svc = started(MockSensor::new(), default_settings(), t0);
    let mut out = Vec::new();

    let warning = svc.test_strike(Zone::Warning, t0, &mut out);
    assert_eq!(warning.distance, Distance::Km(20));
    assert!(warning.synthetic && warning.alerted);
    assert_eq!(alert_zones(&out), vec![Zone::Warning]);
    out.clear();

    let critical = svc.test_strike(Zone::Critical, at(t0, 1), &mut out);
    assert_eq!(critical.distance, Distance::Km(8));
    assert_eq!(critical.energy, 250_000);
    assert_eq!(alert_zones(&out), vec![Zone::Critical]);
    // Synthetic strikes do not count as a sensor reading.
    assert_eq!(svc.status().snapshot(at(t0, 1), 0).last_reading, None);
}

#[test]
fn stop_drops_deadlines_and_start_rearms_them() {
    let t0 = Timestamp::now();
    let mut sensor = MockSensor::new();
    sensor.push_strike(5, 200_000);
    let mut svc = started(sensor, default_settings(), t0);
    let mut out = Vec::new();
    svc.handle_interrupt(t0, &mut out);

    svc.stop(at(t0, 100), &mut out);
    assert_eq!(svc.next_deadline(), None);
    let snap = svc.status().snapshot(at(t0, 100), 0);
    assert!(!snap.running);
    assert!(snap.critical.active);
    assert_eq!(snap.critical.all_clear_in_secs, None);

    out.clear();
    svc.start(at(t0, 2000), &mut out);
    assert_eq!(svc.next_deadline(), Some(at(t0, 2900)));
    svc.handle_timers(at(t0, 2900), &mut out);
    assert_eq!(cleared_zones(&out), vec![Zone::Critical, Zone::Warning]);
}

// ── Fault supervision ─────────────────────────────────────────

#[test]
fn read_fault_degrades_then_recovers_silently() {
    let t0 = Timestamp::now();
    let mut sensor = MockSensor::new();
    sensor.push_fault();
    sensor.push_strike(5, 200_000);
    let mut svc = started(sensor, default_settings(), t0);
    let mut out = Vec::new();

    svc.handle_interrupt(t0, &mut out);
    assert_eq!(svc.health(), SensorHealth::Degraded { failures: 1 });
    assert!(out.is_empty());

    // Edges are ignored until the sensor is back.
    svc.handle_interrupt(at(t0, 1), &mut out);
    assert!(out.is_empty());

    let retry = svc.next_deadline().unwrap();
    assert_eq!(retry, at(t0, 2));
    svc.handle_timers(retry, &mut out);
    assert_eq!(svc.health(), SensorHealth::Healthy);
    assert!(svc.sensor().calls.contains(&SensorCall::Reset));
    // Recovery from Degraded is not announced.
    assert!(out.is_empty());

    svc.handle_interrupt(at(t0, 3), &mut out);
    assert_eq!(alert_zones(&out), vec![Zone::Critical, Zone::Warning]);
}

#[test]
fn exhausted_retries_fault_once_and_announce_recovery() {
    let t0 = Timestamp::now();
    let sensor = MockSensor {
        init_failures: 6,
        ..MockSensor::default()
    };
    let mut svc = started(sensor, default_settings(), t0);
    let mut out = Vec::new();

    let mut now = t0;
    while let Some(next) = svc.next_deadline() {
        now = next;
        svc.handle_timers(now, &mut out);
        if svc.health().is_healthy() {
            break;
        }
    }
    assert_eq!(svc.health(), SensorHealth::Healthy);
    assert_eq!(now, at(t0, 2 + 4 + 8 + 16 + 32 + 60));

    let changes: Vec<StatusChange> = out
        .iter()
        .filter_map(|i| match i {
            Intent::Status { change, .. } => Some(*change),
            _ => None,
        })
        .collect();
    assert_eq!(changes.len(), 2);
    assert!(matches!(changes[0], StatusChange::SensorFaulted { failures: 5, .. }));
    assert_eq!(changes[1], StatusChange::SensorRecovered);
}

#[test]
fn raised_floor_is_restored_after_recovery() {
    let t0 = Timestamp::now();
    let mut sensor = MockSensor::new();
    sensor.push(Interrupt::Noise);
    sensor.push_fault();
    let mut svc = started(sensor, default_settings(), t0);
    let mut out = Vec::new();

    svc.handle_interrupt(t0, &mut out);
    svc.handle_interrupt(at(t0, 1), &mut out);
    assert!(!svc.health().is_healthy());

    svc.handle_timers(at(t0, 3), &mut out);
    assert!(svc.health().is_healthy());
    assert_eq!(svc.sensor().floors(), vec![7, 7]);
    assert_eq!(svc.noise().level(), NoiseLevel::Critical);
}

#[test]
fn zone_timers_still_fire_while_sensor_is_down() {
    let t0 = Timestamp::now();
    let mut sensor = MockSensor::new();
    sensor.push_strike(5, 200_000);
    sensor.push_fault();
    let mut settings = default_settings();
    settings.zones.all_clear_after = Duration::from_secs(1);
    settings.retry.base_backoff = Duration::from_secs(10);
    let mut svc = started(sensor, settings, t0);
    let mut out = Vec::new();
    svc.handle_interrupt(t0, &mut out);
    svc.handle_interrupt(t0, &mut out);
    out.clear();

    svc.handle_timers(at(t0, 1), &mut out);
    assert_eq!(cleared_zones(&out), vec![Zone::Critical, Zone::Warning]);
    assert!(!svc.health().is_healthy());
}
