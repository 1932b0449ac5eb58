//! Unified error types for the detection engine.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! controller and the binary entry point handle failures uniformly.
//! Bus, sensor, and notification errors are `Copy` so they can be passed
//! through the dispatch loop and recorded in the status store without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The lightning sensor could not be driven.
    Sensor(SensorFault),
    /// An outbound notification could not be delivered.
    Notify(NotifyError),
    /// Configuration is missing or invalid.
    Config(ConfigError),
    /// A monitoring controller operation failed.
    Control(ControlError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Notify(e) => write!(f, "notify: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Control(e) => write!(f, "control: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

/// Failure at the register bus or interrupt line level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// SPI transfer failed.
    Transfer,
    /// The IRQ GPIO could not be sampled.
    Gpio,
    /// The bus has been closed and not yet reopened.
    Closed,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer => write!(f, "SPI transfer failed"),
            Self::Gpio => write!(f, "IRQ line read failed"),
            Self::Closed => write!(f, "bus closed"),
        }
    }
}

impl std::error::Error for BusError {}

// ---------------------------------------------------------------------------
// Sensor faults
// ---------------------------------------------------------------------------

/// Sensor-level failure. Retryable by the monitoring controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFault {
    /// Register I/O failed.
    Bus(BusError),
    /// Noise floor level outside 0..=7.
    InvalidNoiseFloor(u8),
    /// RCO calibration did not complete.
    CalibrationFailed,
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus I/O: {e}"),
            Self::InvalidNoiseFloor(level) => write!(f, "invalid noise floor level {level}"),
            Self::CalibrationFailed => write!(f, "RCO calibration failed"),
        }
    }
}

impl std::error::Error for SensorFault {}

impl From<BusError> for SensorFault {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<SensorFault> for Error {
    fn from(e: SensorFault) -> Self {
        Self::Sensor(e)
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Sensor(SensorFault::Bus(e))
    }
}

// ---------------------------------------------------------------------------
// Notification errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyError {
    /// The remote channel refused the message.
    Rejected,
    /// The message could not reach the remote channel.
    Transport,
    /// The remote channel asked us to slow down.
    RateLimited,
    /// The outbound queue is full.
    QueueFull,
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected => write!(f, "message rejected"),
            Self::Transport => write!(f, "transport failure"),
            Self::RateLimited => write!(f, "rate limited"),
            Self::QueueFull => write!(f, "outbound queue full"),
        }
    }
}

impl std::error::Error for NotifyError {}

impl From<NotifyError> for Error {
    fn from(e: NotifyError) -> Self {
        Self::Notify(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file could not be read.
    NotFound(String),
    /// The configuration file is not valid TOML for [`SystemConfig`].
    ///
    /// [`SystemConfig`]: crate::config::SystemConfig
    Parse(String),
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "cannot read {path}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Controller errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// The dispatch thread panicked and its hardware handles were lost.
    WorkerLost,
    /// The dispatch loop did not acknowledge a command in time.
    CommandTimeout,
    /// The sensor was not brought up in time; monitoring stays idle.
    StartTimeout,
    /// The command queue to the dispatch loop is full.
    QueueFull,
    /// Test alerts are only available with `system.debug` enabled.
    DebugDisabled,
    /// A worker thread could not be spawned.
    SpawnFailed,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkerLost => write!(f, "dispatch worker lost"),
            Self::CommandTimeout => write!(f, "command not acknowledged"),
            Self::StartTimeout => write!(f, "sensor bring-up timed out"),
            Self::QueueFull => write!(f, "command queue full"),
            Self::DebugDisabled => write!(f, "test alerts require debug mode"),
            Self::SpawnFailed => write!(f, "could not spawn worker thread"),
        }
    }
}

impl std::error::Error for ControlError {}

impl From<ControlError> for Error {
    fn from(e: ControlError) -> Self {
        Self::Control(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
