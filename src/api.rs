//! API facade for the dashboard / HTTP layer.
//!
//! Every operation returns an [`ApiReply`]: success or failure with a
//! human-readable message, never partial state.

use log::info;
use serde::Serialize;

use crate::alerts::Zone;
use crate::app::ports::{IntentSink, InterruptLine, SensorPort};
use crate::error;
use crate::monitor::MonitoringController;
use crate::status::StatusSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiReply {
    pub ok: bool,
    pub message: String,
}

impl ApiReply {
    fn from_result(result: error::Result<()>, success: &str) -> Self {
        match result {
            Ok(()) => Self {
                ok: true,
                message: success.to_string(),
            },
            Err(e) => Self {
                ok: false,
                message: e.to_string(),
            },
        }
    }
}

pub struct MonitorApi<S, L, K>
where
    S: SensorPort + Send + 'static,
    L: InterruptLine + Send + 'static,
    K: IntentSink + Send + 'static,
{
    controller: MonitoringController<S, L, K>,
}

impl<S, L, K> MonitorApi<S, L, K>
where
    S: SensorPort + Send + 'static,
    L: InterruptLine + Send + 'static,
    K: IntentSink + Send + 'static,
{
    pub fn new(controller: MonitoringController<S, L, K>) -> Self {
        Self { controller }
    }

    /// `GET status`
    pub fn status(&self) -> StatusSnapshot {
        self.controller.status()
    }

    pub fn status_json(&self) -> String {
        serde_json::to_string_pretty(&self.status())
            .unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }

    pub fn start_monitoring(&self) -> ApiReply {
        info!("API | start_monitoring");
        ApiReply::from_result(self.controller.start().map_err(Into::into), "monitoring started")
    }

    pub fn stop_monitoring(&self) -> ApiReply {
        info!("API | stop_monitoring");
        ApiReply::from_result(self.controller.stop().map_err(Into::into), "monitoring stopped")
    }

    pub fn reset_alerts(&self) -> ApiReply {
        info!("API | reset_alerts");
        ApiReply::from_result(self.controller.reset().map_err(Into::into), "alerts and noise modes reset")
    }

    /// Queues the message; delivery is reported by the notifier counters.
    pub fn test_notification(&self) -> ApiReply {
        info!("API | test_notification");
        ApiReply::from_result(
            self.controller.test_notification().map_err(Into::into),
            "test notification queued",
        )
    }

    pub fn test_alert(&self, zone: Zone) -> ApiReply {
        info!("API | test_alert {}", zone);
        ApiReply::from_result(
            self.controller.test_alert(zone).map_err(Into::into),
            &format!("test {} alert injected", zone.label().to_lowercase()),
        )
    }
}
