//! Monitoring runtime: the controller and the threads it owns.

pub mod controller;
pub mod dispatch;

pub use controller::MonitoringController;
