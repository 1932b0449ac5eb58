//! Noise adaptation automaton: the FSM engine bound to its state table
//! and context, with one entry point per input.
//!
//! Every entry point updates state first and returns the sensor writes
//! to perform afterwards, so a failed write can never leave the automaton
//! half-transitioned.

use core::mem;

use log::debug;
use serde::Serialize;

use crate::clock::Timestamp;
use crate::config::NoiseSettings;

use super::context::{NoiseAction, NoiseContext, NoiseReason};
use super::states::build_state_table;
use super::{Fsm, NoiseInput, NoiseLevel};

/// Sensor writes requested by one input.
pub type NoiseActions = heapless::Vec<NoiseAction, 4>;

/// Published view of the automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NoiseState {
    pub level: NoiseLevel,
    pub raised_at: Option<Timestamp>,
    pub reason: Option<NoiseReason>,
    /// Noise floor currently commanded.
    pub floor: u8,
    /// Disturbers inside the rolling window.
    pub recent_disturbers: usize,
}

impl NoiseState {
    /// Normal level at `floor`, nothing pending.
    pub fn resting(floor: u8) -> Self {
        Self {
            level: NoiseLevel::Normal,
            raised_at: None,
            reason: None,
            floor,
            recent_disturbers: 0,
        }
    }
}

pub struct NoiseAutomaton {
    fsm: Fsm,
    ctx: NoiseContext,
}

impl NoiseAutomaton {
    pub fn new(settings: NoiseSettings, now: Timestamp) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), NoiseLevel::Normal),
            ctx: NoiseContext::new(settings, now),
        }
    }

    pub fn on_disturber(&mut self, now: Timestamp) -> NoiseActions {
        self.step(now, NoiseInput::Disturber)
    }

    pub fn on_noise(&mut self, now: Timestamp) -> NoiseActions {
        self.step(now, NoiseInput::Noise)
    }

    /// Revert to Normal if the revert deadline has passed.
    pub fn on_timer(&mut self, now: Timestamp) -> NoiseActions {
        if self.ctx.revert_at.is_none_or(|at| at > now) {
            return NoiseActions::new();
        }
        self.step(now, NoiseInput::RevertDue)
    }

    /// Back to Normal with the default floor, regardless of level.
    pub fn reset(&mut self, now: Timestamp) -> NoiseActions {
        self.ctx.now = now;
        if self.fsm.current_state() == NoiseLevel::Normal {
            self.ctx.restore_default();
        } else {
            self.fsm.force_transition(NoiseLevel::Normal, &mut self.ctx);
        }
        mem::take(&mut self.ctx.actions)
    }

    /// Drop the pending revert deadline.  The level is kept.
    pub fn suspend(&mut self) {
        self.ctx.revert_at = None;
    }

    /// Re-arm a fresh revert deadline if the floor is still raised.
    pub fn resume(&mut self, now: Timestamp) {
        if self.fsm.current_state() != NoiseLevel::Normal {
            self.ctx.now = now;
            self.ctx.arm_revert();
        }
    }

    pub fn level(&self) -> NoiseLevel {
        self.fsm.current_state()
    }

    pub fn revert_deadline(&self) -> Option<Timestamp> {
        self.ctx.revert_at
    }

    /// Noise floor the sensor should be running at.
    pub fn commanded_floor(&self) -> u8 {
        self.ctx.floor
    }

    pub fn state(&self, now: Timestamp) -> NoiseState {
        NoiseState {
            level: self.level(),
            raised_at: self.ctx.raised_at,
            reason: self.ctx.reason,
            floor: self.ctx.floor,
            recent_disturbers: self
                .ctx
                .window
                .count_within(now, self.ctx.settings.time_window),
        }
    }

    fn step(&mut self, now: Timestamp, input: NoiseInput) -> NoiseActions {
        if !self.ctx.settings.enabled {
            debug!("NOISE | adaptation disabled, ignoring {:?}", input);
            return NoiseActions::new();
        }
        self.ctx.now = now;
        self.fsm.dispatch(input, &mut self.ctx);
        mem::take(&mut self.ctx.actions)
    }
}
