//! System configuration parameters
//!
//! All tunable parameters for the lightning monitor, loaded from a TOML
//! file with one table per section.  [`Settings::from_config`] validates
//! the raw values once at startup and resolves them into the immutable
//! structure every component is constructed from.

use core::time::Duration;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sensors::registers::{AFE_GAIN_INDOOR, AFE_GAIN_OUTDOOR, MAX_NOISE_FLOOR};

/// Core system configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub sensor: SensorConfig,
    pub alerts: AlertConfig,
    pub noise_handling: NoiseConfig,
    pub notifications: NotificationConfig,
    pub system: RuntimeConfig,
    pub logging: LoggingConfig,
}

/// Receiver sensitivity preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    /// Noise floor, spike rejection, and watchdog threshold for this preset.
    pub const fn register_levels(self) -> (u8, u8, u8) {
        match self {
            Self::Low => (4, 3, 3),
            Self::Medium => (2, 2, 2),
            Self::High => (1, 1, 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// SPI bus number
    pub spi_bus: u8,
    /// SPI chip select on that bus
    pub spi_device: u8,
    /// GPIO carrying the sensor IRQ line
    pub irq_pin: u8,
    /// Indoor AFE gain when true, outdoor otherwise
    pub indoor: bool,
    pub sensitivity: Sensitivity,
    /// Start monitoring as soon as the service boots
    pub auto_start: bool,
    /// Consecutive failed re-initialisations before the sensor is Faulted
    pub max_retries: u32,
    /// First retry delay (seconds), doubled per failure
    pub retry_backoff_secs: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            spi_bus: 0,
            spi_device: 0,
            irq_pin: 4,
            indoor: false,
            sensitivity: Sensitivity::Medium,
            auto_start: true,
            max_retries: 5,
            retry_backoff_secs: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Minimum strike energy considered for alerting
    pub energy_threshold: u32,
    /// Critical zone radius (km)
    pub critical_distance: u8,
    /// Warning zone radius (km)
    pub warning_distance: u8,
    /// Quiet period before an all-clear (minutes)
    pub all_clear_timer: u32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 100_000,
            critical_distance: 10,
            warning_distance: 30,
            all_clear_timer: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub enabled: bool,
    /// Disturbers within the window that raise the noise floor
    pub event_threshold: u32,
    pub time_window_seconds: u32,
    pub raised_noise_floor_level: u8,
    pub revert_delay_minutes: u32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            event_threshold: 15,
            time_window_seconds: 120,
            raised_noise_floor_level: 5,
            revert_delay_minutes: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub channel: String,
    /// Delivery attempts per message, including the first
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Sustained outbound rate (messages per second)
    pub rate_per_sec: u64,
    pub burst: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel: "#alerts".into(),
            max_attempts: 3,
            retry_delay_ms: 500,
            rate_per_sec: 1,
            burst: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Enables test alerts
    pub debug: bool,
    pub telemetry_interval_secs: u32,
    /// Events returned with each status snapshot
    pub status_event_limit: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            debug: false,
            telemetry_interval_secs: 60,
            status_event_limit: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl SystemConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from `path`.  A missing file yields the defaults; an unreadable
    /// or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("CONFIG | {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(_) => Err(ConfigError::NotFound(path.display().to_string())),
        }
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.alerts;
        if a.critical_distance == 0 || a.critical_distance > 63 {
            return Err(ConfigError::ValidationFailed(
                "alerts.critical_distance must be 1..=63 km",
            ));
        }
        if a.warning_distance == 0 || a.warning_distance > 63 {
            return Err(ConfigError::ValidationFailed(
                "alerts.warning_distance must be 1..=63 km",
            ));
        }
        if a.warning_distance <= a.critical_distance {
            return Err(ConfigError::ValidationFailed(
                "alerts.warning_distance must exceed critical_distance",
            ));
        }
        if a.energy_threshold > 0x1F_FFFF {
            return Err(ConfigError::ValidationFailed(
                "alerts.energy_threshold exceeds the 21-bit energy range",
            ));
        }
        if a.all_clear_timer == 0 {
            return Err(ConfigError::ValidationFailed(
                "alerts.all_clear_timer must be non-zero",
            ));
        }

        let n = &self.noise_handling;
        if n.event_threshold == 0 || n.event_threshold as usize > crate::fsm::context::WINDOW_CAPACITY {
            return Err(ConfigError::ValidationFailed(
                "noise_handling.event_threshold must be 1..=64",
            ));
        }
        if n.time_window_seconds == 0 {
            return Err(ConfigError::ValidationFailed(
                "noise_handling.time_window_seconds must be non-zero",
            ));
        }
        if n.raised_noise_floor_level > MAX_NOISE_FLOOR {
            return Err(ConfigError::ValidationFailed(
                "noise_handling.raised_noise_floor_level must be 0..=7",
            ));
        }
        let (default_floor, _, _) = self.sensor.sensitivity.register_levels();
        if n.raised_noise_floor_level <= default_floor {
            return Err(ConfigError::ValidationFailed(
                "noise_handling.raised_noise_floor_level must exceed the sensitivity default",
            ));
        }
        if n.revert_delay_minutes == 0 {
            return Err(ConfigError::ValidationFailed(
                "noise_handling.revert_delay_minutes must be non-zero",
            ));
        }

        let s = &self.sensor;
        if s.retry_backoff_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "sensor.retry_backoff_secs must be non-zero",
            ));
        }
        if s.max_retries == 0 {
            return Err(ConfigError::ValidationFailed(
                "sensor.max_retries must be non-zero",
            ));
        }

        let m = &self.notifications;
        if m.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "notifications.max_attempts must be non-zero",
            ));
        }
        if m.rate_per_sec == 0 || m.burst == 0 {
            return Err(ConfigError::ValidationFailed(
                "notifications.rate_per_sec and burst must be non-zero",
            ));
        }
        if self.system.telemetry_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "system.telemetry_interval_secs must be non-zero",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

/// Register values programmed into the sensor at initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSettings {
    pub indoor: bool,
    pub afe_gain: u8,
    pub noise_floor: u8,
    pub spike_rejection: u8,
    pub watchdog_threshold: u8,
}

impl SensorSettings {
    pub fn new(indoor: bool, sensitivity: Sensitivity) -> Self {
        let (noise_floor, spike_rejection, watchdog_threshold) = sensitivity.register_levels();
        Self {
            indoor,
            afe_gain: if indoor { AFE_GAIN_INDOOR } else { AFE_GAIN_OUTDOOR },
            noise_floor,
            spike_rejection,
            watchdog_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseSettings {
    pub enabled: bool,
    pub event_threshold: usize,
    pub time_window: Duration,
    pub default_level: u8,
    pub raised_level: u8,
    pub max_level: u8,
    pub revert_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneSettings {
    pub energy_threshold: u32,
    pub critical_distance_km: u8,
    pub warning_distance_km: u8,
    pub all_clear_after: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `failures` (1-based): base doubled per
    /// failure, capped at `max_backoff`.
    pub fn backoff(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(1 << shift)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifySettings {
    pub enabled: bool,
    pub channel: String,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub rate_per_sec: u64,
    pub burst: u64,
}

/// Immutable, validated settings shared by reference with every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub sensor: SensorSettings,
    pub noise: NoiseSettings,
    pub zones: ZoneSettings,
    pub retry: RetryPolicy,
    pub notify: NotifySettings,
    pub auto_start: bool,
    pub debug: bool,
    pub telemetry_interval: Duration,
    pub status_event_limit: usize,
}

/// Upper bound for the sensor re-initialisation backoff.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(60);

impl Settings {
    /// Validate `config` and resolve it.  This is the only place a
    /// configuration error can surface.
    pub fn from_config(config: &SystemConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let sensor = SensorSettings::new(config.sensor.indoor, config.sensor.sensitivity);
        let n = &config.noise_handling;
        let a = &config.alerts;
        let m = &config.notifications;
        Ok(Self {
            sensor,
            noise: NoiseSettings {
                enabled: n.enabled,
                event_threshold: n.event_threshold as usize,
                time_window: Duration::from_secs(u64::from(n.time_window_seconds)),
                default_level: sensor.noise_floor,
                raised_level: n.raised_noise_floor_level,
                max_level: MAX_NOISE_FLOOR,
                revert_delay: Duration::from_secs(u64::from(n.revert_delay_minutes) * 60),
            },
            zones: ZoneSettings {
                energy_threshold: a.energy_threshold,
                critical_distance_km: a.critical_distance,
                warning_distance_km: a.warning_distance,
                all_clear_after: Duration::from_secs(u64::from(a.all_clear_timer) * 60),
            },
            retry: RetryPolicy {
                max_retries: config.sensor.max_retries,
                base_backoff: Duration::from_secs(u64::from(config.sensor.retry_backoff_secs)),
                max_backoff: MAX_RETRY_BACKOFF,
            },
            notify: NotifySettings {
                enabled: m.enabled,
                channel: m.channel.clone(),
                max_attempts: m.max_attempts,
                retry_delay: Duration::from_millis(m.retry_delay_ms),
                rate_per_sec: m.rate_per_sec,
                burst: m.burst,
            },
            auto_start: config.sensor.auto_start,
            debug: config.system.debug,
            telemetry_interval: Duration::from_secs(u64::from(config.system.telemetry_interval_secs)),
            status_event_limit: config.system.status_event_limit,
        })
    }
}
