//! Application core: detection and alerting logic, no direct I/O.
//!
//! This module ties the noise automaton, the alert zones, and the status
//! store together behind the [`service::DetectionService`].  All
//! interaction with hardware and the chat channel happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
