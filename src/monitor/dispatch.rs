//! Dispatch and IRQ threads.
//!
//! The dispatch thread is the single writer of detection state.  It runs
//! an `edge-executor` with two tasks, driven by `block_on`:
//!
//! 1. **Dispatch**: races the edge queue, the command queue, the stop
//!    signal and a reactor timer armed at the service's next deadline.
//! 2. **Telemetry**: logs a one-line status summary every interval.
//!
//! ```text
//!  ┌───────────────┐  EdgeEvent  ┌──────────────────────────────────┐
//!  │  IRQ thread   │────────────▶│  Dispatch thread                 │
//!  │  wait_for_edge│             │  ┌────────────┐ ┌─────────────┐  │
//!  └───────────────┘             │  │ Dispatch   │ │ Telemetry   │  │
//!         ▲ cancel               │  │ edge/cmd/⏱ │ │ interval ⏱  │  │
//!         │                      │  └────────────┘ └─────────────┘  │
//!  ┌──────┴────────┐  Command    │                                  │
//!  │  Controller   │────────────▶│                                  │
//!  └───────────────┘  stop       └──────────────────────────────────┘
//! ```
//!
//! The IRQ thread is only spawned after the dispatch loop has raised
//! `ready`, i.e. after the sensor has been initialised.  Initialisation
//! presets the chip and wipes any latched cause, so an edge forwarded
//! before that point would read back as nothing.
//!
//! The timer is re-armed from [`DetectionService::next_deadline`] on
//! every turn, so a replaced deadline simply replaces the timer and a
//! stale one can never fire.  Both threads hand their hardware back
//! through the join handle so monitoring can be restarted.

use core::time::Duration;
use std::sync::Arc;
use std::thread::JoinHandle;

use futures_lite::future;
use log::{debug, info, warn};

use crate::app::commands::ControlCommand;
use crate::app::ports::{IntentSink, InterruptLine, SensorPort};
use crate::app::service::DetectionService;
use crate::clock::Timestamp;
use crate::error::ControlError;
use crate::events::{CancelToken, EdgeEvent, EdgeWait, LoopChannels};
use crate::status::StatusStore;

/// Pause after an IRQ line fault before sampling the line again.
const LINE_FAULT_PAUSE: Duration = Duration::from_secs(1);

/// Granularity at which that pause observes cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(20);

/// Edge-to-dispatch latency above which a debug line is logged.
const SLOW_EDGE: Duration = Duration::from_millis(100);

enum Wake {
    Edge(EdgeEvent),
    Command(ControlCommand),
    Timer,
    Stop,
}

// ── Dispatch thread ──────────────────────────────────────────

/// Spawn the dispatch thread.  The service and sink come back through
/// the join handle once the stop signal has been handled.
pub fn spawn_dispatch<S, K>(
    mut service: DetectionService<S>,
    mut sink: K,
    channels: Arc<LoopChannels>,
) -> Result<JoinHandle<(DetectionService<S>, K)>, ControlError>
where
    S: SensorPort + Send + 'static,
    K: IntentSink + Send + 'static,
{
    std::thread::Builder::new()
        .name("dispatch".into())
        .spawn(move || {
            run_dispatch(&mut service, &mut sink, &channels);
            (service, sink)
        })
        .map_err(|_| ControlError::SpawnFailed)
}

/// Run the dispatch loop to completion on the calling thread.
pub fn run_dispatch<S: SensorPort, K: IntentSink>(
    service: &mut DetectionService<S>,
    sink: &mut K,
    channels: &LoopChannels,
) {
    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
    let interval = service.settings().telemetry_interval;
    executor
        .spawn(telemetry_loop(service.status().clone(), interval))
        .detach();

    info!("CTRL | dispatch loop started");
    future::block_on(executor.run(dispatch_loop(service, sink, channels)));
    info!("CTRL | dispatch loop exited");
}

async fn dispatch_loop<S: SensorPort, K: IntentSink>(
    service: &mut DetectionService<S>,
    sink: &mut K,
    channels: &LoopChannels,
) {
    service.start(Timestamp::now(), sink);
    channels.ready.signal(());
    loop {
        let wake = next_wake(service.next_deadline(), channels).await;
        let now = Timestamp::now();
        match wake {
            Wake::Edge(EdgeEvent::Fired(at)) => {
                let lag = now.saturating_duration_since(at);
                if lag > SLOW_EDGE {
                    debug!("CTRL | edge handled {}ms after it fired", lag.as_millis());
                }
                service.handle_interrupt(now, sink);
            }
            Wake::Edge(EdgeEvent::LineFault(e)) => service.handle_line_fault(e, now, sink),
            Wake::Command(cmd) => {
                service.handle_command(cmd, now, sink);
                channels.ack.signal(());
            }
            Wake::Timer => service.handle_timers(now, sink),
            Wake::Stop => break,
        }
    }
    service.stop(Timestamp::now(), sink);
}

/// Wait for whichever comes first.  Stop wins ties, then commands, then
/// edges, then the timer.
async fn next_wake(deadline: Option<Timestamp>, channels: &LoopChannels) -> Wake {
    let stop = async {
        channels.stop.wait().await;
        Wake::Stop
    };
    let command = async { Wake::Command(channels.commands.receive().await) };
    let edge = async { Wake::Edge(channels.edges.receive().await) };
    let timer = async {
        match deadline {
            Some(at) => {
                async_io_mini::Timer::after(at.remaining_from(Timestamp::now())).await;
                Wake::Timer
            }
            None => future::pending().await,
        }
    };
    future::or(stop, future::or(command, future::or(edge, timer))).await
}

async fn telemetry_loop(status: StatusStore, interval: Duration) {
    loop {
        async_io_mini::Timer::after(interval).await;
        let snap = status.snapshot(Timestamp::now(), 0);
        info!(
            "TELEM | noise={:?} floor={} disturbers={} | critical={} warning={} | \
             health={:?} | strikes={} | notify sent={} failed={} dropped={}",
            snap.noise.level,
            snap.noise.floor,
            snap.noise.recent_disturbers,
            if snap.critical.active { "ACTIVE" } else { "clear" },
            if snap.warning.active { "ACTIVE" } else { "clear" },
            snap.sensor_health,
            snap.events_logged,
            snap.notifications.sent,
            snap.notifications.failed,
            snap.notifications.dropped,
        );
    }
}

// ── IRQ thread ───────────────────────────────────────────────

/// Spawn the IRQ thread.  It forwards every edge to the dispatch loop
/// and returns the line once `cancel` is observed.
pub fn spawn_irq<L>(
    line: L,
    channels: Arc<LoopChannels>,
    cancel: CancelToken,
) -> Result<JoinHandle<L>, ControlError>
where
    L: InterruptLine + Send + 'static,
{
    std::thread::Builder::new()
        .name("irq".into())
        .spawn(move || irq_loop(line, &channels, &cancel))
        .map_err(|_| ControlError::SpawnFailed)
}

fn irq_loop<L: InterruptLine>(mut line: L, channels: &LoopChannels, cancel: &CancelToken) -> L {
    info!("IRQ | waiting for sensor interrupts");
    while !cancel.is_cancelled() {
        match line.wait_for_edge(cancel) {
            Ok(EdgeWait::Fired) => {
                channels.push_edge(EdgeEvent::Fired(Timestamp::now()));
            }
            Ok(EdgeWait::Cancelled) => break,
            Err(e) => {
                warn!("IRQ | line fault: {}", e);
                channels.push_edge(EdgeEvent::LineFault(e));
                pause(LINE_FAULT_PAUSE, cancel);
            }
        }
    }
    info!("IRQ | stopped");
    line
}

fn pause(total: Duration, cancel: &CancelToken) {
    let mut waited = Duration::ZERO;
    while waited < total && !cancel.is_cancelled() {
        std::thread::sleep(CANCEL_POLL);
        waited += CANCEL_POLL;
    }
}
