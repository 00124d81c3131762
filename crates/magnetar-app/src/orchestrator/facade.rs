//! Submission entry point used by the HTTP surface.

use async_trait::async_trait;
use magnetar_events::{JobId, ProgressEvent};
use magnetar_runtime::JobRecord;
use magnetar_torrent_core::{
    BackendError, DownloadWorkflow, SubmitDownload, SubmitError, SubmitResult,
};
use tracing::{Instrument, info, info_span, warn};

use super::Coordinator;

#[async_trait]
impl DownloadWorkflow for Coordinator {
    async fn submit(&self, request: SubmitDownload) -> SubmitResult<ProgressEvent> {
        let category = match request.category.resolve() {
            Ok(category) => category,
            Err(err) => {
                self.metrics.inc_submission("invalid");
                return Err(err.into());
            }
        };
        let job_id = JobId::generate();
        let span = info_span!(
            "submit",
            job_id = %job_id,
            category = %category,
            source = request.source.kind()
        );

        async {
            let Some(download_dir) = self.download_dirs.get(category) else {
                self.metrics.inc_submission("backend_unavailable");
                return Err(SubmitError::BackendUnavailable {
                    source: BackendError::Rejected {
                        operation: "download_dir",
                        message: format!("no download directory configured for {category}"),
                    },
                });
            };

            let handle = match self
                .backend_call("torrent.add", self.backend.add(&request.source, download_dir))
                .await
            {
                Ok(handle) => handle,
                Err(source) => {
                    self.metrics.inc_submission("backend_unavailable");
                    warn!(error = %source, "download backend refused submission");
                    return Err(SubmitError::BackendUnavailable { source });
                }
            };

            let record = JobRecord::new(job_id.clone(), handle, category);
            if let Err(err) = self.jobs.create(&record).await {
                self.metrics.inc_submission("store_failed");
                warn!(error = %err, torrent_id = %handle, "failed to record accepted download");
                return Err(SubmitError::Store {
                    operation: "job.create",
                    source: Box::new(err),
                });
            }

            self.metrics.inc_submission("accepted");
            info!(torrent_id = %handle, download_dir = %download_dir, "download submitted");
            Ok(ProgressEvent::started(job_id.clone()))
        }
        .instrument(span)
        .await
    }
}
