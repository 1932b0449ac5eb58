//! Concrete noise state handler functions and table builder.
//!
//! ```text
//!  NORMAL ──[≥ threshold disturbers in window]──▶ ELEVATED
//!    ▲  ▲                                            │ │
//!    │  └───────────────[revert timer]───────────────┘ │
//!    │                                            [noise]
//!    │                                                 ▼
//!    └──────────────────[revert timer]─────────── CRITICAL ◀──[noise]── NORMAL
//! ```
//!
//! Disturbers while Elevated postpone the revert.  Noise while Critical
//! re-writes the maximum floor and re-arms the revert.

use super::context::{NoiseContext, NoiseReason};
use super::{NoiseInput, NoiseLevel, StateDescriptor};
use log::{debug, info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; NoiseLevel::COUNT] {
    [
        // Index 0: Normal
        StateDescriptor {
            id: NoiseLevel::Normal,
            name: "Normal",
            on_enter: Some(normal_enter),
            on_exit: None,
            on_event: normal_event,
        },
        // Index 1: Elevated
        StateDescriptor {
            id: NoiseLevel::Elevated,
            name: "Elevated",
            on_enter: Some(elevated_enter),
            on_exit: Some(raised_exit),
            on_event: elevated_event,
        },
        // Index 2: Critical
        StateDescriptor {
            id: NoiseLevel::Critical,
            name: "Critical",
            on_enter: Some(critical_enter),
            on_exit: Some(raised_exit),
            on_event: critical_event,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  NORMAL state
// ═══════════════════════════════════════════════════════════════════════════

fn normal_enter(ctx: &mut NoiseContext) {
    ctx.restore_default();
    info!(
        "NOISE | Normal: floor restored to {}",
        ctx.settings.default_level
    );
}

fn normal_event(ctx: &mut NoiseContext, input: NoiseInput) -> Option<NoiseLevel> {
    match input {
        NoiseInput::Disturber => {
            let count = ctx.window.record(ctx.now, ctx.settings.time_window);
            if count >= ctx.settings.event_threshold {
                info!(
                    "NOISE | {} disturbers within {}s, raising floor",
                    count,
                    ctx.settings.time_window.as_secs()
                );
                return Some(NoiseLevel::Elevated);
            }
            debug!(
                "NOISE | disturber {}/{} in window",
                count, ctx.settings.event_threshold
            );
            None
        }
        NoiseInput::Noise => Some(NoiseLevel::Critical),
        NoiseInput::RevertDue => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  ELEVATED state: disturber burst
// ═══════════════════════════════════════════════════════════════════════════

fn elevated_enter(ctx: &mut NoiseContext) {
    ctx.reason = Some(NoiseReason::DisturberThreshold);
    ctx.raised_at = Some(ctx.now);
    ctx.window.clear();
    ctx.request_floor(ctx.settings.raised_level);
    ctx.arm_revert();
    warn!(
        "NOISE | Elevated: floor {} for {}s",
        ctx.settings.raised_level,
        ctx.settings.revert_delay.as_secs()
    );
}

fn elevated_event(ctx: &mut NoiseContext, input: NoiseInput) -> Option<NoiseLevel> {
    match input {
        NoiseInput::Disturber => {
            ctx.window.record(ctx.now, ctx.settings.time_window);
            ctx.arm_revert();
            debug!("NOISE | disturber while elevated, revert postponed");
            None
        }
        // Persistent noise dominates a transient burst.
        NoiseInput::Noise => Some(NoiseLevel::Critical),
        NoiseInput::RevertDue if ctx.revert_due() => Some(NoiseLevel::Normal),
        NoiseInput::RevertDue => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CRITICAL state: saturated front end
// ═══════════════════════════════════════════════════════════════════════════

fn critical_enter(ctx: &mut NoiseContext) {
    ctx.reason = Some(NoiseReason::PersistentNoise);
    ctx.raised_at = Some(ctx.now);
    ctx.window.clear();
    ctx.request_floor(ctx.settings.max_level);
    ctx.arm_revert();
    warn!(
        "NOISE | Critical: persistent noise, floor {} for {}s",
        ctx.settings.max_level,
        ctx.settings.revert_delay.as_secs()
    );
}

fn critical_event(ctx: &mut NoiseContext, input: NoiseInput) -> Option<NoiseLevel> {
    match input {
        NoiseInput::Noise => {
            ctx.request_floor(ctx.settings.max_level);
            ctx.arm_revert();
            info!("NOISE | noise while critical, revert re-armed");
            None
        }
        NoiseInput::Disturber => {
            debug!("NOISE | disturber ignored while critical");
            None
        }
        NoiseInput::RevertDue if ctx.revert_due() => Some(NoiseLevel::Normal),
        NoiseInput::RevertDue => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared exit
// ═══════════════════════════════════════════════════════════════════════════

fn raised_exit(ctx: &mut NoiseContext) {
    if let Some(since) = ctx.raised_at {
        info!(
            "NOISE | leaving raised floor after {}s",
            ctx.now.saturating_duration_since(since).as_secs()
        );
    }
}
