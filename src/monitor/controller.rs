//! Monitoring controller: lifecycle of the dispatch and IRQ threads.
//!
//! ```text
//!            start()                    stop()
//!   Idle ─────────────▶ Running ─────────────────▶ Idle
//!    │                     │ thread panicked
//!    │ spawn failed        ▼
//!    └────────────────▶  Lost
//! ```
//!
//! While idle the controller owns the service, the IRQ line and the
//! intent sink directly, so `reset()` and `test_alert()` are applied on
//! the caller's thread.  While running they are forwarded to the dispatch
//! loop as commands and acknowledged, which keeps the loop the only
//! writer.

use core::time::Duration;
use std::sync::Arc;
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{error, info, warn};
use parking_lot::Mutex;

use crate::alerts::Zone;
use crate::app::commands::ControlCommand;
use crate::app::ports::{IntentSink, InterruptLine, SensorPort};
use crate::app::service::DetectionService;
use crate::clock::Timestamp;
use crate::config::Settings;
use crate::error::ControlError;
use crate::events::{CancelToken, LoopChannels};
use crate::status::{StatusSnapshot, StatusStore};

use super::dispatch::{spawn_dispatch, spawn_irq};

/// How long a command may wait for the dispatch loop to apply it.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// How long `start()` waits for the sensor to be brought up.
pub const START_TIMEOUT: Duration = Duration::from_secs(5);

enum Lifecycle<S: SensorPort, L, K> {
    Idle {
        service: DetectionService<S>,
        line: L,
        sink: K,
    },
    Running {
        channels: Arc<LoopChannels>,
        cancel: CancelToken,
        dispatch: JoinHandle<(DetectionService<S>, K)>,
        irq: JoinHandle<L>,
    },
    /// A worker thread died and took the hardware handles with it.
    Lost,
}

pub struct MonitoringController<S, L, K>
where
    S: SensorPort + Send + 'static,
    L: InterruptLine + Send + 'static,
    K: IntentSink + Send + 'static,
{
    state: Mutex<Lifecycle<S, L, K>>,
    status: StatusStore,
    settings: Arc<Settings>,
}

impl<S, L, K> MonitoringController<S, L, K>
where
    S: SensorPort + Send + 'static,
    L: InterruptLine + Send + 'static,
    K: IntentSink + Send + 'static,
{
    pub fn new(service: DetectionService<S>, line: L, sink: K) -> Self {
        Self {
            status: service.status().clone(),
            settings: service.settings().clone(),
            state: Mutex::new(Lifecycle::Idle {
                service,
                line,
                sink,
            }),
        }
    }

    /// Launch the dispatch loop and, once the sensor is initialised, the
    /// IRQ thread.  Returns after bring-up, so an interrupt raised from
    /// here on is seen.  No-op if already running.
    pub fn start(&self) -> Result<(), ControlError> {
        let mut state = self.state.lock();
        match core::mem::replace(&mut *state, Lifecycle::Lost) {
            running @ Lifecycle::Running { .. } => {
                *state = running;
                info!("CTRL | start requested, already running");
                Ok(())
            }
            Lifecycle::Lost => Err(ControlError::WorkerLost),
            Lifecycle::Idle {
                service,
                line,
                sink,
            } => {
                let channels = Arc::new(LoopChannels::new());
                let dispatch = match spawn_dispatch(service, sink, channels.clone()) {
                    Ok(handle) => handle,
                    Err(e) => {
                        error!("CTRL | dispatch thread could not be spawned");
                        return Err(e);
                    }
                };

                if !wait_signal(&channels.ready, START_TIMEOUT) {
                    error!(
                        "CTRL | sensor bring-up not finished within {}s, aborting start",
                        START_TIMEOUT.as_secs()
                    );
                    channels.stop.signal(());
                    return match dispatch.join() {
                        Ok((service, sink)) => {
                            *state = Lifecycle::Idle {
                                service,
                                line,
                                sink,
                            };
                            Err(ControlError::StartTimeout)
                        }
                        Err(_) => Err(ControlError::WorkerLost),
                    };
                }

                let cancel = CancelToken::new();
                let irq = match spawn_irq(line, channels.clone(), cancel.clone()) {
                    Ok(handle) => handle,
                    Err(e) => {
                        error!("CTRL | IRQ thread could not be spawned");
                        channels.stop.signal(());
                        let _ = dispatch.join();
                        return Err(e);
                    }
                };
                *state = Lifecycle::Running {
                    channels,
                    cancel,
                    dispatch,
                    irq,
                };
                info!("CTRL | monitoring started");
                Ok(())
            }
        }
    }

    /// Cancel the IRQ wait and the dispatch loop and wait for both.
    /// Pending deadlines are dropped; the last status stays readable.
    pub fn stop(&self) -> Result<(), ControlError> {
        let mut state = self.state.lock();
        match core::mem::replace(&mut *state, Lifecycle::Lost) {
            idle @ Lifecycle::Idle { .. } => {
                *state = idle;
                Ok(())
            }
            Lifecycle::Lost => Err(ControlError::WorkerLost),
            Lifecycle::Running {
                channels,
                cancel,
                dispatch,
                irq,
            } => {
                cancel.cancel();
                channels.stop.signal(());
                let joined = (dispatch.join(), irq.join());
                match joined {
                    (Ok((service, sink)), Ok(line)) => {
                        *state = Lifecycle::Idle {
                            service,
                            line,
                            sink,
                        };
                        info!("CTRL | monitoring stopped");
                        Ok(())
                    }
                    _ => {
                        error!("CTRL | worker thread panicked, hardware handles lost");
                        Err(ControlError::WorkerLost)
                    }
                }
            }
        }
    }

    /// Force both zones inactive and the noise floor back to default.
    pub fn reset(&self) -> Result<(), ControlError> {
        self.command(ControlCommand::ResetAlerts)
    }

    /// Synthesise a qualifying strike for `zone`.  Only with debug enabled.
    pub fn test_alert(&self, zone: Zone) -> Result<(), ControlError> {
        if !self.settings.debug {
            warn!("CTRL | test alert refused, debug disabled");
            return Err(ControlError::DebugDisabled);
        }
        self.command(ControlCommand::TestStrike(zone))
    }

    /// Send a test message through the notification channel.
    pub fn test_notification(&self) -> Result<(), ControlError> {
        self.command(ControlCommand::TestNotification)
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status
            .snapshot(Timestamp::now(), self.settings.status_event_limit)
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), Lifecycle::Running { .. })
    }

    fn command(&self, cmd: ControlCommand) -> Result<(), ControlError> {
        let mut state = self.state.lock();
        match &mut *state {
            Lifecycle::Lost => Err(ControlError::WorkerLost),
            Lifecycle::Idle { service, sink, .. } => {
                service.handle_command(cmd, Timestamp::now(), sink);
                Ok(())
            }
            Lifecycle::Running { channels, .. } => {
                channels.ack.reset();
                channels
                    .commands
                    .try_send(cmd)
                    .map_err(|_| ControlError::QueueFull)?;
                if wait_signal(&channels.ack, COMMAND_TIMEOUT) {
                    Ok(())
                } else {
                    warn!("CTRL | {:?} not acknowledged in time", cmd);
                    Err(ControlError::CommandTimeout)
                }
            }
        }
    }
}

/// Block until `signal` is raised or `timeout` passes.
fn wait_signal(signal: &Signal<CriticalSectionRawMutex, ()>, timeout: Duration) -> bool {
    future::block_on(future::or(
        async {
            signal.wait().await;
            true
        },
        async {
            async_io_mini::Timer::after(timeout).await;
            false
        },
    ))
}

impl<S, L, K> Drop for MonitoringController<S, L, K>
where
    S: SensorPort + Send + 'static,
    L: InterruptLine + Send + 'static,
    K: IntentSink + Send + 'static,
{
    fn drop(&mut self) {
        if self.stop().is_err() {
            warn!("CTRL | monitoring did not stop cleanly");
        }
    }
}
