//! Stormwatch main entry point
//!
//! Hexagonal architecture with an event-driven dispatch thread.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimulatedAs3935   SimIrq          LogChannel     StdDelay     │
//! │  (RegisterBus)     (InterruptLine) (Notification) (DelayNs)    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │           DetectionService (pure logic)                │    │
//! │  │  Noise FSM · Alert zones · Fault supervision           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  MonitoringController (dispatch + IRQ threads) · Notifier      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Without a bound sensor bus the binary drives the simulated AS3935 and
//! reads operator commands from stdin.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use stormwatch::adapters::log_sink::LogChannel;
use stormwatch::adapters::sim::{self, SimHandle};
use stormwatch::adapters::time::StdDelay;
use stormwatch::alerts::Zone;
use stormwatch::api::{ApiReply, MonitorApi};
use stormwatch::app::ports::{IntentSink, InterruptLine, SensorPort};
use stormwatch::app::service::DetectionService;
use stormwatch::clock::Timestamp;
use stormwatch::config::{Settings, SystemConfig};
use stormwatch::fsm::NoiseState;
use stormwatch::monitor::MonitoringController;
use stormwatch::notify::Notifier;
use stormwatch::sensors::Distance;
use stormwatch::sensors::as3935::As3935;
use stormwatch::status::StatusStore;

const DEFAULT_CONFIG: &str = "config.toml";

fn main() -> Result<()> {
    // ── 1. Configuration (fails fast) ─────────────────────────
    let path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from);
    let config = SystemConfig::load(&path)
        .with_context(|| format!("loading {}", path.display()))?;

    // ── 2. Logging ────────────────────────────────────────────
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();
    if !path.exists() {
        warn!("BOOT | {} not found, running with defaults", path.display());
    }

    let settings = Arc::new(Settings::from_config(&config).context("invalid configuration")?);
    info!(
        "BOOT | stormwatch v{} | {} | critical<={}km warning<={}km energy>={}",
        env!("CARGO_PKG_VERSION"),
        if settings.sensor.indoor { "indoor" } else { "outdoor" },
        settings.zones.critical_distance_km,
        settings.zones.warning_distance_km,
        settings.zones.energy_threshold
    );

    // ── 3. Adapters ───────────────────────────────────────────
    info!(
        "BOOT | no sensor bus bound (spi{}.{} irq={}), using simulated AS3935",
        config.sensor.spi_bus, config.sensor.spi_device, config.sensor.irq_pin
    );
    let (bus, irq, handle) = sim::simulated();
    let sensor = As3935::new(bus, StdDelay::new(), settings.sensor);

    if settings.notify.enabled {
        info!("BOOT | no chat transport bound, {} goes to the log", settings.notify.channel);
    } else {
        info!("BOOT | chat delivery disabled, notifications go to the log");
    }
    let status = StatusStore::new(
        settings.sensor.indoor,
        NoiseState::resting(settings.noise.default_level),
    );
    let mut notifier = Notifier::spawn(
        LogChannel::new(settings.notify.channel.clone()),
        settings.notify.clone(),
        status.stats().clone(),
    )?;

    // ── 4. Core + controller ──────────────────────────────────
    let service = DetectionService::new(sensor, settings.clone(), status, Timestamp::now());
    let api = MonitorApi::new(MonitoringController::new(service, irq, notifier.sender()));

    if settings.auto_start {
        report(&api.start_monitoring());
    }

    // ── 5. Console ────────────────────────────────────────────
    info!("BOOT | ready, type `help` for commands");
    console(&api, &handle)?;

    report(&api.stop_monitoring());
    drop(api);
    notifier.shutdown();
    info!("BOOT | bye");
    Ok(())
}

fn console<S, L, K>(api: &MonitorApi<S, L, K>, sim_handle: &SimHandle) -> Result<()>
where
    S: SensorPort + Send + 'static,
    L: InterruptLine + Send + 'static,
    K: IntentSink + Send + 'static,
{
    for line in std::io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => {}
            ["status"] => println!("{}", api.status_json()),
            ["start"] => report(&api.start_monitoring()),
            ["stop"] => report(&api.stop_monitoring()),
            ["reset"] => report(&api.reset_alerts()),
            ["test", "notify"] => report(&api.test_notification()),
            ["test", zone] => match parse_zone(zone) {
                Some(z) => report(&api.test_alert(z)),
                None => println!("unknown zone `{zone}` (critical|warning)"),
            },
            ["strike", "far", energy] => match energy.parse::<u32>() {
                Ok(energy) => sim_handle.strike(Distance::OutOfRange, energy),
                Err(_) => println!("usage: strike far <energy>"),
            },
            ["strike", km, energy] => match (km.parse::<u8>(), energy.parse::<u32>()) {
                (Ok(km), Ok(energy)) => sim_handle.strike(Distance::Km(km), energy),
                _ => println!("usage: strike <km> <energy>"),
            },
            ["disturber"] => sim_handle.disturber(),
            ["disturber", n] => {
                for _ in 0..n.parse::<u32>().unwrap_or(1) {
                    sim_handle.disturber();
                }
            }
            ["noise"] => sim_handle.noise(),
            ["fail", n] => sim_handle.fail_next(n.parse().unwrap_or(1)),
            ["offline"] => sim_handle.set_offline(true),
            ["online"] => sim_handle.set_offline(false),
            ["quit" | "exit"] => break,
            ["help"] => print_help(),
            _ => println!("unknown command, type `help`"),
        }
    }
    Ok(())
}

fn parse_zone(word: &str) -> Option<Zone> {
    match word {
        "critical" => Some(Zone::Critical),
        "warning" => Some(Zone::Warning),
        _ => None,
    }
}

fn report(reply: &ApiReply) {
    if reply.ok {
        info!("API | {}", reply.message);
    } else {
        warn!("API | failed: {}", reply.message);
    }
}

fn print_help() {
    println!(
        "commands:\n  \
         status | start | stop | reset | test <critical|warning|notify>\n  \
         strike <km> <energy> | strike far <energy> | disturber [n] | noise\n  \
         fail <n> | offline | online | quit"
    );
}
