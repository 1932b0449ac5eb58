//! Interrupt-driven event system.
//!
//! Wake-ups for the dispatch context are produced by:
//! - the IRQ thread (sensor edges, IRQ line faults)
//! - the monitoring controller (reset / test alert commands, stop)
//!
//! and consumed by the dispatch loop, which is the only writer of the
//! detection state.  Timer expiries never travel through here: the loop
//! computes its next deadline itself, so a replaced deadline can never
//! fire stale.
//!
//! ```text
//! ┌─────────────┐  EdgeEvent   ┌──────────────┐
//! │ IRQ thread  │─────────────▶│              │
//! └─────────────┘              │  Dispatch    │
//! ┌─────────────┐  Command     │  loop        │
//! │ Controller  │─────────────▶│  (single     │
//! │             │◀─────────────│   writer)    │
//! └─────────────┘ ready / ack  └──────────────┘
//! ```

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use log::warn;

use crate::app::commands::ControlCommand;
use crate::clock::Timestamp;
use crate::error::BusError;

/// Depth of the edge queue between the IRQ thread and the dispatch loop.
const EDGE_DEPTH: usize = 16;

/// Depth of the command queue.
const COMMAND_DEPTH: usize = 4;

// ── Cooperative cancellation ─────────────────────────────────

/// Shared cancel flag observed by blocking waits.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Outcome of [`InterruptLine::wait_for_edge`](crate::app::ports::InterruptLine::wait_for_edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeWait {
    Fired,
    Cancelled,
}

// ── Queue payloads ───────────────────────────────────────────

/// Something the IRQ thread observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEvent {
    /// An IRQ edge fired at this time.
    Fired(Timestamp),
    /// The IRQ line could not be sampled.
    LineFault(BusError),
}

// ── Channels ─────────────────────────────────────────────────

/// Channels and signals connecting one dispatch loop to its producers.
pub struct LoopChannels {
    pub edges: Channel<CriticalSectionRawMutex, EdgeEvent, EDGE_DEPTH>,
    pub commands: Channel<CriticalSectionRawMutex, ControlCommand, COMMAND_DEPTH>,
    /// Raised by the loop once the sensor has been brought up.
    pub ready: Signal<CriticalSectionRawMutex, ()>,
    /// Raised by the loop after a command has been applied.
    pub ack: Signal<CriticalSectionRawMutex, ()>,
    /// Raised by the controller to end the loop.
    pub stop: Signal<CriticalSectionRawMutex, ()>,
}

impl LoopChannels {
    pub fn new() -> Self {
        Self {
            edges: Channel::new(),
            commands: Channel::new(),
            ready: Signal::new(),
            ack: Signal::new(),
            stop: Signal::new(),
        }
    }

    /// Push an edge event.  Returns `false` if the queue is full (event
    /// dropped).
    pub fn push_edge(&self, event: EdgeEvent) -> bool {
        if self.edges.try_send(event).is_err() {
            warn!("IRQ | edge queue full, dropping {:?}", event);
            return false;
        }
        true
    }
}

impl Default for LoopChannels {
    fn default() -> Self {
        Self::new()
    }
}
