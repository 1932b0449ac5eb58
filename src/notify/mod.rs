//! Outbound notifications: rendering, dedup and delivery.

pub mod dispatcher;
pub mod format;
pub mod worker;

pub use dispatcher::{Delivery, Dispatcher};
pub use format::OutboundMessage;
pub use worker::{IntentSender, Notifier};
