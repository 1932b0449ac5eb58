//! Function-pointer finite state machine engine for noise adaptation.
//!
//! Classic embedded FSM pattern, event-driven:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  StateTable                                              │
//! │  ┌──────────┬───────────┬──────────┬──────────────────┐  │
//! │  │ Level    │ on_enter  │ on_exit  │ on_event         │  │
//! │  ├──────────┼───────────┼──────────┼──────────────────┤  │
//! │  │ Normal   │ fn(ctx)   │ -        │ fn(ctx, in)->Opt │  │
//! │  │ Elevated │ fn(ctx)   │ fn(ctx)  │ fn(ctx, in)->Opt │  │
//! │  │ Critical │ fn(ctx)   │ fn(ctx)  │ fn(ctx, in)->Opt │  │
//! │  └──────────┴───────────┴──────────┴──────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each input is delivered to `on_event` of the **current** state.  If it
//! returns `Some(next)`, the engine runs `on_exit` for the current state,
//! then `on_enter` for the next, and updates the current pointer.  All
//! functions receive `&mut NoiseContext`, which holds the disturber
//! window, the revert deadline, and the sensor actions requested by the
//! handlers.

pub mod automaton;
pub mod context;
pub mod states;

use context::NoiseContext;
use log::info;
use serde::Serialize;

pub use automaton::{NoiseActions, NoiseAutomaton, NoiseState};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Noise adaptation level.  Must stay in sync with the state table built in
/// [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum NoiseLevel {
    /// Rest state, default noise floor.
    Normal = 0,
    /// Disturber burst, raised noise floor.
    Elevated = 1,
    /// Saturated front end, maximum noise floor.
    Critical = 2,
}

impl NoiseLevel {
    /// Total number of states; sizes the table array.
    pub const COUNT: usize = 3;

    /// Convert an index back to `NoiseLevel`.  Panics on out-of-range in
    /// debug builds; returns `Normal` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Normal,
            1 => Self::Elevated,
            2 => Self::Critical,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Normal
            }
        }
    }
}

/// Inputs delivered to the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseInput {
    Disturber,
    Noise,
    /// The revert deadline may have passed.
    RevertDue,
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut NoiseContext);

/// Signature for the per-input handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateEventFn = fn(&mut NoiseContext, NoiseInput) -> Option<NoiseLevel>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct StateDescriptor {
    pub id: NoiseLevel,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_event: StateEventFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Fixed-size table indexed by `NoiseLevel as usize`.
    table: [StateDescriptor; NoiseLevel::COUNT],
    current: usize,
    /// Number of transitions taken since construction.
    transitions: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; NoiseLevel::COUNT], initial: NoiseLevel) -> Self {
        Self {
            table,
            current: initial as usize,
            transitions: 0,
        }
    }

    /// Deliver one input to the current state, transitioning if it asks to.
    pub fn dispatch(&mut self, input: NoiseInput, ctx: &mut NoiseContext) {
        let next = (self.table[self.current].on_event)(ctx, input);
        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Force an immediate transition (operator reset).  No-op if already
    /// in `next`.
    pub fn force_transition(&mut self, next: NoiseLevel, ctx: &mut NoiseContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> NoiseLevel {
        NoiseLevel::from_index(self.current)
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: NoiseLevel, ctx: &mut NoiseContext) {
        let next_idx = next_id as usize;

        info!(
            "NOISE | transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.transitions += 1;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
