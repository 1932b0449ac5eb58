//! Stormwatch lightning detection library.
//!
//! Exposes the detection engine, its adapters and the monitoring runtime
//! for the binary and for integration testing.

#![deny(unused_must_use)]

pub mod adapters;
pub mod alerts;
pub mod api;
pub mod app;
pub mod clock;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod fsm;
pub mod monitor;
pub mod notify;
pub mod sensors;
pub mod status;
