use std::sync::Arc;

use magnetar_telemetry::Metrics;
use magnetar_torrent_core::DownloadWorkflow;

/// Shared state handed to every handler.
pub(crate) struct ApiState {
    pub(crate) workflow: Arc<dyn DownloadWorkflow>,
    pub(crate) telemetry: Metrics,
}

impl ApiState {
    pub(crate) fn new(workflow: Arc<dyn DownloadWorkflow>, telemetry: Metrics) -> Self {
        Self {
            workflow,
            telemetry,
        }
    }
}
