//! End-to-end tests: simulated AS3935 → IRQ thread → dispatch loop →
//! notifier thread → recording channel, with millisecond-scale timers.

use core::time::Duration;
use std::sync::Arc;

use stormwatch::adapters::sim::{self, SimHandle, SimIrq, SimulatedAs3935};
use stormwatch::adapters::time::StdDelay;
use stormwatch::alerts::Zone;
use stormwatch::api::MonitorApi;
use stormwatch::app::service::DetectionService;
use stormwatch::clock::Timestamp;
use stormwatch::config::Settings;
use stormwatch::error::ControlError;
use stormwatch::fsm::NoiseLevel;
use stormwatch::monitor::MonitoringController;
use stormwatch::notify::{IntentSender, Notifier};
use stormwatch::sensors::Distance;
use stormwatch::sensors::as3935::As3935;
use stormwatch::status::SensorHealth;

use crate::mock_hw::{RecordingChannel, default_settings, fast_settings, status_for, wait_until};

type SimSensor = As3935<SimulatedAs3935, StdDelay>;
type SimController = MonitoringController<SimSensor, SimIrq, IntentSender>;

const WAIT: Duration = Duration::from_secs(3);

struct Rig {
    controller: SimController,
    sim: SimHandle,
    channel: RecordingChannel,
    // Dropped after the controller so the final intents are delivered.
    _notifier: Notifier,
}

fn rig(settings: Settings) -> Rig {
    let settings = Arc::new(settings);
    let (bus, irq, sim) = sim::simulated();
    let sensor = As3935::new(bus, StdDelay::new(), settings.sensor);
    let status = status_for(&settings);
    let channel = RecordingChannel::new();
    let notifier = Notifier::spawn(
        channel.clone(),
        settings.notify.clone(),
        status.stats().clone(),
    )
    .unwrap();
    let service = DetectionService::new(sensor, settings, status, Timestamp::now());
    let controller = MonitoringController::new(service, irq, notifier.sender());
    Rig {
        controller,
        sim,
        channel,
        _notifier: notifier,
    }
}

#[test]
fn strike_alerts_and_clears_both_zones() {
    let r = rig(fast_settings());
    r.controller.start().unwrap();
    assert!(r.controller.is_running());
    assert!(wait_until(WAIT, || r.channel.contains("monitoring started")));

    r.sim.strike(Distance::Km(5), 200_000);
    assert!(wait_until(WAIT, || {
        r.channel.contains("CRITICAL") && r.channel.contains("WARNING")
    }));
    let snap = r.controller.status();
    assert!(snap.critical.active && snap.warning.active);
    assert_eq!(snap.events[0].distance, Distance::Km(5));
    assert_eq!(snap.events[0].energy, 200_000);

    assert!(wait_until(WAIT, || r.channel.count("ALL CLEAR") == 2));
    let snap = r.controller.status();
    assert!(!snap.critical.active && !snap.warning.active);

    r.controller.stop().unwrap();
    assert!(!r.controller.is_running());
    assert!(!r.controller.status().running);
    assert!(wait_until(WAIT, || r.channel.contains("monitoring stopped")));
    assert_eq!(r.channel.count("CRITICAL: Lightning"), 1);
}

#[test]
fn strike_right_after_start_is_not_lost() {
    let r = rig(fast_settings());
    r.controller.start().unwrap();
    // Start returns once the sensor is initialised.
    assert!(r.controller.status().running);
    assert_eq!(r.sim.presets(), 1);

    r.sim.strike(Distance::Km(20), 300_000);
    assert!(wait_until(WAIT, || r.controller.status().warning.active));
    let snap = r.controller.status();
    assert_eq!(snap.events_logged, 1);
    assert_eq!(snap.events[0].distance, Distance::Km(20));
}

#[test]
fn strike_queued_before_start_survives_initialisation() {
    let r = rig(fast_settings());
    r.sim.strike(Distance::Km(4), 250_000);
    r.controller.start().unwrap();
    assert!(wait_until(WAIT, || r.controller.status().critical.active));
    assert_eq!(r.sim.queued(), 0);
}

#[test]
fn disturber_storm_raises_sensor_floor_until_revert() {
    let r = rig(fast_settings());
    r.controller.start().unwrap();
    assert!(wait_until(WAIT, || r.controller.status().running));
    assert_eq!(r.sim.noise_floor(), 2);

    for _ in 0..15 {
        r.sim.disturber();
    }
    assert!(wait_until(WAIT, || r.sim.noise_floor() == 5));
    assert_eq!(r.controller.status().noise.level, NoiseLevel::Elevated);

    assert!(wait_until(WAIT, || r.sim.noise_floor() == 2));
    assert_eq!(r.controller.status().noise.level, NoiseLevel::Normal);
    assert_eq!(r.sim.floor_writes().last(), Some(&2));
}

#[test]
fn commands_are_applied_inside_the_running_loop() {
    let mut settings = fast_settings();
    settings.zones.all_clear_after = Duration::from_millis(600);
    let r = rig(settings);
    r.controller.start().unwrap();

    r.controller.test_alert(Zone::Critical).unwrap();
    // Acknowledged means already applied.
    let snap = r.controller.status();
    assert!(snap.critical.active);
    assert!(snap.events[0].synthetic);
    assert!(wait_until(WAIT, || r.channel.contains("TEST CRITICAL")));

    r.sim.noise();
    assert!(wait_until(WAIT, || r.sim.noise_floor() == 7));

    r.controller.reset().unwrap();
    let snap = r.controller.status();
    assert!(!snap.critical.active && !snap.warning.active);
    assert_eq!(snap.noise.level, NoiseLevel::Normal);
    assert!(wait_until(WAIT, || r.sim.noise_floor() == 2));
    assert!(wait_until(WAIT, || r.channel.contains("reset by operator")));
    // Reset never reports an all-clear.
    std::thread::sleep(Duration::from_millis(800));
    assert_eq!(r.channel.count("ALL CLEAR"), 0);
}

#[test]
fn commands_while_idle_apply_directly() {
    let r = rig(fast_settings());
    r.controller.test_alert(Zone::Warning).unwrap();
    let snap = r.controller.status();
    assert!(snap.warning.active && !snap.critical.active);
    assert!(!snap.running);
    r.controller.reset().unwrap();
    assert!(!r.controller.status().warning.active);
}

#[test]
fn test_alert_requires_debug() {
    let r = rig(default_settings());
    assert_eq!(
        r.controller.test_alert(Zone::Critical),
        Err(ControlError::DebugDisabled)
    );
}

#[test]
fn monitoring_restarts_with_the_same_hardware() {
    let r = rig(fast_settings());
    r.controller.start().unwrap();
    // Second start is a no-op.
    r.controller.start().unwrap();
    r.controller.stop().unwrap();
    r.controller.stop().unwrap();

    r.controller.start().unwrap();
    r.sim.strike(Distance::Km(20), 300_000);
    assert!(wait_until(WAIT, || r.controller.status().warning.active));
    r.controller.stop().unwrap();
    assert!(r.sim.presets() >= 2);
    assert!(wait_until(WAIT, || r.channel.count("monitoring started") == 2));
}

#[test]
fn offline_sensor_faults_then_recovers() {
    let mut settings = fast_settings();
    settings.retry.base_backoff = Duration::from_millis(20);
    settings.retry.max_backoff = Duration::from_millis(40);
    let r = rig(settings);
    r.sim.set_offline(true);
    r.controller.start().unwrap();

    assert!(wait_until(WAIT, || matches!(
        r.controller.status().sensor_health,
        SensorHealth::Faulted { .. }
    )));
    assert!(wait_until(WAIT, || r.channel.contains("Sensor faulted")));
    assert!(r.controller.status().last_fault.is_some());

    r.sim.set_offline(false);
    assert!(wait_until(WAIT, || r.controller.status().sensor_health.is_healthy()));
    assert!(wait_until(WAIT, || r.channel.contains("Sensor recovered")));
    assert_eq!(r.channel.count("Sensor faulted"), 1);

    r.sim.strike(Distance::Km(3), 150_000);
    assert!(wait_until(WAIT, || r.controller.status().critical.active));
}

#[test]
fn api_replies_and_status_json() {
    let r = rig(fast_settings());
    let api = MonitorApi::new(r.controller);

    assert!(api.start_monitoring().ok);
    assert!(wait_until(WAIT, || api.status().running));
    let json: serde_json::Value = serde_json::from_str(&api.status_json()).unwrap();
    assert_eq!(json["running"], true);
    assert_eq!(json["indoor_mode"], false);
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));

    assert!(api.test_alert(Zone::Warning).ok);
    assert!(api.status().warning.active);
    assert!(api.reset_alerts().ok);
    assert!(api.stop_monitoring().ok);
    assert!(!api.status().running);
}

#[test]
fn test_notification_reaches_the_channel() {
    // Not gated on debug, unlike test strikes.
    let r = rig(default_settings());
    let api = MonitorApi::new(r.controller);

    let reply = api.test_notification();
    assert!(reply.ok, "{}", reply.message);
    assert!(wait_until(WAIT, || r.channel.count("Test message from stormwatch") == 1));

    assert!(api.start_monitoring().ok);
    assert!(api.test_notification().ok);
    assert!(wait_until(WAIT, || r.channel.count("Test message from stormwatch") == 2));
    assert!(api.stop_monitoring().ok);

    let snap = api.status();
    assert!(!snap.critical.active && !snap.warning.active);
    assert_eq!(snap.events_logged, 0);
}
