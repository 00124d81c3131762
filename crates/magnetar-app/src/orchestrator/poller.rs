//! The single poll routine shared by the progress checker and recovery monitors.

use std::time::Duration;

use chrono::Utc;
use magnetar_events::{JobId, MESSAGE_FAILED, MESSAGE_LOST, MESSAGE_STOPPED, ProgressEvent};
use magnetar_runtime::{JobRecord, StoreError};
use magnetar_torrent_core::{BackendState, BackendStatus};
use tracing::{debug, info, warn};

use super::Coordinator;
use crate::error::PollError;

/// Path that scheduled a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Steady-state sweep over the active set.
    Checker,
    /// Stale-record sweep or a per-job recovery monitor.
    Recovery,
}

impl Trigger {
    /// Label used in spans and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checker => "checker",
            Self::Recovery => "recovery",
        }
    }
}

/// Result of one poll that produced an event.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    /// Event handed to the progress queue.
    pub event: ProgressEvent,
    /// Whether the job was resolved and its record removed.
    pub terminal: bool,
    /// Backend ETA for a running transfer.
    pub eta: Option<Duration>,
}

impl PollOutcome {
    fn terminal(event: ProgressEvent) -> Self {
        Self {
            event,
            terminal: true,
            eta: None,
        }
    }
}

impl Coordinator {
    /// Poll the backend for `job_id` and apply the resulting transition.
    ///
    /// Returns `Ok(None)` when the job is no longer tracked, including when a
    /// concurrent poll resolved it first; no event is emitted in that case.
    ///
    /// # Errors
    ///
    /// [`PollError::Backend`] when the backend could not answer (the record is
    /// untouched) and [`PollError::Store`] when a store call failed. A terminal
    /// event is still published when only its cleanup failed.
    pub async fn poll_once(
        &self,
        job_id: &JobId,
        trigger: Trigger,
    ) -> Result<Option<PollOutcome>, PollError> {
        let record = match self.jobs.load(job_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.jobs
                    .deactivate(job_id)
                    .await
                    .map_err(|source| store_error(job_id, "job.deactivate", source))?;
                self.metrics.inc_poll("untracked");
                debug!(trigger = trigger.as_str(), "job record no longer exists");
                return Ok(None);
            }
            Err(StoreError::InvalidRecord { key, field }) => {
                warn!(key = %key, field, "discarding malformed job record");
                self.jobs
                    .remove(job_id)
                    .await
                    .map_err(|source| store_error(job_id, "job.remove", source))?;
                self.metrics.inc_poll("malformed");
                return Ok(None);
            }
            Err(source) => return Err(store_error(job_id, "job.load", source)),
        };

        let status = self
            .backend_call("torrent.status", self.backend.status(record.handle))
            .await;
        let outcome = match status {
            Ok(status) => self.interpret(&record, status).await,
            Err(err) if err.is_not_found() => {
                PollOutcome::terminal(ProgressEvent::failed(job_id.clone(), "", MESSAGE_LOST))
            }
            Err(source) => {
                self.metrics.inc_poll("backend_error");
                return Err(PollError::Backend {
                    job_id: job_id.clone(),
                    source,
                });
            }
        };

        if outcome.terminal {
            self.resolve(&record, outcome).await
        } else {
            self.advance(&record, outcome).await
        }
    }

    async fn interpret(&self, record: &JobRecord, status: BackendStatus) -> PollOutcome {
        let job_id = record.job_id.clone();
        match status.state {
            BackendState::Error => {
                PollOutcome::terminal(ProgressEvent::failed(job_id, status.name, MESSAGE_FAILED))
            }
            BackendState::Stopped => {
                PollOutcome::terminal(ProgressEvent::failed(job_id, status.name, MESSAGE_STOPPED))
            }
            BackendState::Done => PollOutcome::terminal(self.complete(record, status.name).await),
            BackendState::InProgress | BackendState::Unspecified => PollOutcome {
                eta: status.eta(),
                event: ProgressEvent::in_progress(
                    job_id,
                    status.name,
                    status.progress,
                    status.eta_seconds,
                ),
                terminal: false,
            },
        }
    }

    /// Refresh the library for a finished download and build its terminal event.
    async fn complete(&self, record: &JobRecord, name: String) -> ProgressEvent {
        let refreshed = self
            .backend_call(
                "library.refresh",
                self.refresher.refresh_category(record.category),
            )
            .await;
        match refreshed {
            Ok(report) if report.success => {
                info!(category = %record.category, "library refreshed for completed download");
                ProgressEvent::succeeded(record.job_id.clone(), name)
            }
            Ok(report) => {
                warn!(category = %record.category, message = %report.message, "library refresh declined");
                refresh_failed(record, name, report.message)
            }
            Err(err) => {
                warn!(error = %err, category = %record.category, "library refresh failed");
                refresh_failed(record, name, format!("Failed to refresh library: {err}"))
            }
        }
    }

    async fn resolve(
        &self,
        record: &JobRecord,
        outcome: PollOutcome,
    ) -> Result<Option<PollOutcome>, PollError> {
        let removed = self.jobs.remove(&record.job_id).await;
        self.publish(&outcome.event).await;
        self.metrics.inc_poll(outcome.event.kind());
        info!(
            torrent_id = %record.handle,
            status = outcome.event.status.as_str(),
            message = %outcome.event.message,
            "download resolved"
        );
        removed.map_err(|source| store_error(&record.job_id, "job.remove", source))?;
        Ok(Some(outcome))
    }

    async fn advance(
        &self,
        record: &JobRecord,
        outcome: PollOutcome,
    ) -> Result<Option<PollOutcome>, PollError> {
        let touched = self
            .jobs
            .touch(&record.job_id, Utc::now())
            .await
            .map_err(|source| store_error(&record.job_id, "job.touch", source))?;
        if !touched {
            self.metrics.inc_poll("untracked");
            debug!("job resolved concurrently; dropping progress update");
            return Ok(None);
        }
        self.publish(&outcome.event).await;
        self.metrics.inc_poll(outcome.event.kind());
        debug!(
            torrent_id = %record.handle,
            progress = outcome.event.progress,
            eta_seconds = outcome.event.eta_seconds,
            "download progressing"
        );
        Ok(Some(outcome))
    }
}

fn refresh_failed(record: &JobRecord, name: String, message: String) -> ProgressEvent {
    ProgressEvent::failed(record.job_id.clone(), name, message).with_progress(100.0)
}

fn store_error(job_id: &JobId, operation: &'static str, source: StoreError) -> PollError {
    PollError::Store {
        job_id: job_id.clone(),
        operation,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::test_support::{harness, harness_with_store};
    use magnetar_events::{DownloadStatus, MESSAGE_COMPLETED};
    use magnetar_runtime::{ACTIVE_SET_KEY, KeyValueStore, record_key};
    use magnetar_test_support::{
        FaultyStore, RefreshScript, StatusScript, backend_status, magnet_uri,
    };
    use magnetar_torrent_core::{
        BackendError, Category, DownloadWorkflow, RequestedCategory, SubmitDownload, TorrentSource,
    };
    use std::sync::Arc;

    fn magnet_request(category: Category) -> SubmitDownload {
        SubmitDownload {
            category: RequestedCategory::from(category),
            source: TorrentSource::magnet(magnet_uri("abc")),
        }
    }

    #[tokio::test]
    async fn running_download_publishes_progress_and_touches_record() -> anyhow::Result<()> {
        let h = harness();
        let started = h.coordinator.submit(magnet_request(Category::Films)).await?;
        let handle = h.backend.adds()[0].handle;
        h.backend.script(
            handle,
            [StatusScript::Status(backend_status(
                handle.0,
                BackendState::InProgress,
                42.0,
                90,
            ))],
        );
        let before = h.jobs.load(&started.job_id).await?.expect("record").last_update;

        let outcome = h
            .coordinator
            .poll_once(&started.job_id, Trigger::Checker)
            .await?
            .expect("outcome");
        assert!(!outcome.terminal);
        assert_eq!(outcome.eta, Some(Duration::from_secs(90)));
        assert_eq!(outcome.event.status, DownloadStatus::InProgress);
        assert_eq!(outcome.event.eta_seconds, 90);

        let queued = h.queue.pop().await?.expect("queued event");
        assert_eq!(queued, outcome.event);
        let after = h.jobs.load(&started.job_id).await?.expect("record").last_update;
        assert!(after >= before);
        assert_eq!(h.jobs.active_ids().await?, vec![started.job_id.clone()]);
        Ok(())
    }

    #[tokio::test]
    async fn completed_download_refreshes_library_and_cleans_up() -> anyhow::Result<()> {
        let h = harness();
        let started = h.coordinator.submit(magnet_request(Category::Series)).await?;
        let handle = h.backend.adds()[0].handle;
        h.backend.script(
            handle,
            [StatusScript::Status(backend_status(
                handle.0,
                BackendState::Done,
                100.0,
                0,
            ))],
        );

        let outcome = h
            .coordinator
            .poll_once(&started.job_id, Trigger::Checker)
            .await?
            .expect("outcome");
        assert!(outcome.terminal);
        assert_eq!(outcome.event.status, DownloadStatus::Success);
        assert_eq!(outcome.event.message, MESSAGE_COMPLETED);
        assert_eq!(h.refresher.calls(), vec![Category::Series]);

        assert!(h.jobs.load(&started.job_id).await?.is_none());
        assert!(h.jobs.active_ids().await?.is_empty());
        assert!(
            h.store
                .hash_get_all(&record_key(&started.job_id))
                .await?
                .is_empty()
        );
        assert!(h.store.set_members(ACTIVE_SET_KEY).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn declined_refresh_publishes_library_message_at_full_progress() -> anyhow::Result<()> {
        let h = harness();
        let started = h.coordinator.submit(magnet_request(Category::Shorts)).await?;
        let handle = h.backend.adds()[0].handle;
        h.backend.script(
            handle,
            [StatusScript::Status(backend_status(
                handle.0,
                BackendState::Done,
                100.0,
                0,
            ))],
        );
        h.refresher
            .script([RefreshScript::Decline("unexpected status code: 500".to_string())]);

        let outcome = h
            .coordinator
            .poll_once(&started.job_id, Trigger::Checker)
            .await?
            .expect("outcome");
        assert!(outcome.terminal);
        assert_eq!(outcome.event.status, DownloadStatus::Error);
        assert_eq!(outcome.event.message, "unexpected status code: 500");
        assert!((outcome.event.progress - 100.0).abs() < f64::EPSILON);
        assert!(h.jobs.load(&started.job_id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_library_also_downgrades_to_error() -> anyhow::Result<()> {
        let h = harness();
        let started = h.coordinator.submit(magnet_request(Category::Films)).await?;
        let handle = h.backend.adds()[0].handle;
        h.backend.script(
            handle,
            [StatusScript::Status(backend_status(
                handle.0,
                BackendState::Done,
                100.0,
                0,
            ))],
        );
        h.refresher.script([RefreshScript::Unavailable]);

        let outcome = h
            .coordinator
            .poll_once(&started.job_id, Trigger::Checker)
            .await?
            .expect("outcome");
        assert_eq!(outcome.event.status, DownloadStatus::Error);
        assert!(outcome.event.message.starts_with("Failed to refresh library: "));
        assert!(outcome.event.message.contains("scripted failure"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn hung_status_call_times_out_without_touching_state() -> anyhow::Result<()> {
        let h = harness();
        let started = h.coordinator.submit(magnet_request(Category::Films)).await?;
        let handle = h.backend.adds()[0].handle;
        h.backend.script(handle, [StatusScript::Hang]);
        while h.queue.pop().await?.is_some() {}
        let before = h.jobs.load(&started.job_id).await?.expect("record");

        let err = h
            .coordinator
            .poll_once(&started.job_id, Trigger::Checker)
            .await
            .expect_err("status call should time out");
        match err {
            PollError::Backend { job_id, source } => {
                assert_eq!(job_id, started.job_id);
                assert!(matches!(
                    source,
                    BackendError::Timeout { timeout, .. } if timeout == h.coordinator.scheduler().call_timeout
                ));
            }
            other => panic!("expected backend timeout, got {other:?}"),
        }
        assert_eq!(h.jobs.load(&started.job_id).await?, Some(before));
        assert_eq!(h.jobs.active_ids().await?, vec![started.job_id.clone()]);
        assert!(h.queue.pop().await?.is_none());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn hung_refresh_fails_the_job_at_full_progress() -> anyhow::Result<()> {
        let h = harness();
        let started = h.coordinator.submit(magnet_request(Category::Series)).await?;
        let handle = h.backend.adds()[0].handle;
        h.backend.script(
            handle,
            [StatusScript::Status(backend_status(
                handle.0,
                BackendState::Done,
                100.0,
                0,
            ))],
        );
        h.refresher.script([RefreshScript::Hang]);

        let outcome = h
            .coordinator
            .poll_once(&started.job_id, Trigger::Checker)
            .await?
            .expect("outcome");
        assert!(outcome.terminal);
        assert_eq!(outcome.event.status, DownloadStatus::Error);
        assert!(outcome.event.message.starts_with("Failed to refresh library: "));
        assert!((outcome.event.progress - 100.0).abs() < f64::EPSILON);
        assert_eq!(h.refresher.calls(), vec![Category::Series]);
        assert!(h.jobs.load(&started.job_id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn backend_error_and_stopped_states_fail_the_job() -> anyhow::Result<()> {
        let h = harness();
        let failed = h.coordinator.submit(magnet_request(Category::Films)).await?;
        let stopped = h.coordinator.submit(magnet_request(Category::Films)).await?;
        let adds = h.backend.adds();
        h.backend.script(
            adds[0].handle,
            [StatusScript::Status(backend_status(
                adds[0].handle.0,
                BackendState::Error,
                12.0,
                -1,
            ))],
        );
        h.backend.script(
            adds[1].handle,
            [StatusScript::Status(backend_status(
                adds[1].handle.0,
                BackendState::Stopped,
                12.0,
                -1,
            ))],
        );

        let first = h
            .coordinator
            .poll_once(&failed.job_id, Trigger::Checker)
            .await?
            .expect("outcome");
        assert_eq!(first.event.message, MESSAGE_FAILED);
        let second = h
            .coordinator
            .poll_once(&stopped.job_id, Trigger::Recovery)
            .await?
            .expect("outcome");
        assert_eq!(second.event.message, MESSAGE_STOPPED);
        assert!(h.refresher.calls().is_empty());
        assert!(h.jobs.active_ids().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn lost_torrent_fails_without_refresh() -> anyhow::Result<()> {
        let h = harness();
        let started = h.coordinator.submit(magnet_request(Category::Cartoons)).await?;
        h.backend.script(h.backend.adds()[0].handle, [StatusScript::NotFound]);

        let outcome = h
            .coordinator
            .poll_once(&started.job_id, Trigger::Checker)
            .await?
            .expect("outcome");
        assert!(outcome.terminal);
        assert_eq!(outcome.event.status, DownloadStatus::Error);
        assert_eq!(outcome.event.message, MESSAGE_LOST);
        assert!(h.refresher.calls().is_empty());
        assert!(h.jobs.load(&started.job_id).await?.is_none());
        assert_eq!(h.store.list_len(h.queue.key()).await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn resolved_job_emits_nothing_on_second_poll() -> anyhow::Result<()> {
        let h = harness();
        let started = h.coordinator.submit(magnet_request(Category::Films)).await?;
        h.backend.script(h.backend.adds()[0].handle, [StatusScript::NotFound]);

        assert!(
            h.coordinator
                .poll_once(&started.job_id, Trigger::Checker)
                .await?
                .is_some()
        );
        assert!(
            h.coordinator
                .poll_once(&started.job_id, Trigger::Recovery)
                .await?
                .is_none()
        );
        assert_eq!(h.store.list_len(h.queue.key()).await, 1);
        assert_eq!(h.backend.status_calls(h.backend.adds()[0].handle), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unavailable_backend_leaves_record_untouched() -> anyhow::Result<()> {
        let h = harness();
        let started = h.coordinator.submit(magnet_request(Category::Films)).await?;
        h.backend.script(h.backend.adds()[0].handle, [StatusScript::Unavailable]);
        let before = h.jobs.load(&started.job_id).await?.expect("record");

        let err = h
            .coordinator
            .poll_once(&started.job_id, Trigger::Checker)
            .await
            .expect_err("backend down");
        assert!(matches!(err, PollError::Backend { .. }));
        assert_eq!(h.jobs.load(&started.job_id).await?, Some(before));
        assert_eq!(h.store.list_len(h.queue.key()).await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn category_survives_until_deletion() -> anyhow::Result<()> {
        let h = harness();
        let started = h
            .coordinator
            .submit(magnet_request(Category::CartoonsSeries))
            .await?;
        let handle = h.backend.adds()[0].handle;
        h.backend.script(
            handle,
            [
                StatusScript::Status(backend_status(handle.0, BackendState::InProgress, 10.0, 30)),
                StatusScript::Status(backend_status(handle.0, BackendState::InProgress, 60.0, 20)),
                StatusScript::Status(backend_status(handle.0, BackendState::Done, 100.0, 0)),
            ],
        );

        for _ in 0..2 {
            h.coordinator
                .poll_once(&started.job_id, Trigger::Checker)
                .await?;
            let record = h.jobs.load(&started.job_id).await?.expect("record");
            assert_eq!(record.category, Category::CartoonsSeries);
        }
        h.coordinator
            .poll_once(&started.job_id, Trigger::Checker)
            .await?;
        assert_eq!(h.refresher.calls(), vec![Category::CartoonsSeries]);
        Ok(())
    }

    #[tokio::test]
    async fn publish_failure_does_not_roll_back_terminal_cleanup() -> anyhow::Result<()> {
        let faulty = Arc::new(FaultyStore::new());
        let h = harness_with_store(faulty.clone(), faulty.inner());
        let started = h.coordinator.submit(magnet_request(Category::Films)).await?;
        h.backend.script(h.backend.adds()[0].handle, [StatusScript::NotFound]);
        faulty.fail("list_push");

        let outcome = h
            .coordinator
            .poll_once(&started.job_id, Trigger::Checker)
            .await?
            .expect("outcome");
        assert!(outcome.terminal);
        assert!(h.jobs.load(&started.job_id).await?.is_none());
        assert_eq!(h.metrics.snapshot().publish_failures_total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn failed_cleanup_still_publishes_terminal_event() -> anyhow::Result<()> {
        let faulty = Arc::new(FaultyStore::new());
        let h = harness_with_store(faulty.clone(), faulty.inner());
        let started = h.coordinator.submit(magnet_request(Category::Films)).await?;
        h.backend.script(h.backend.adds()[0].handle, [StatusScript::NotFound]);
        faulty.fail("delete");

        let err = h
            .coordinator
            .poll_once(&started.job_id, Trigger::Checker)
            .await
            .expect_err("cleanup failed");
        assert!(matches!(err, PollError::Store { operation: "job.remove", .. }));
        assert_eq!(h.store.list_len(h.queue.key()).await, 1);
        assert!(h.jobs.active_ids().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn malformed_record_is_discarded() -> anyhow::Result<()> {
        let h = harness();
        let job_id = JobId::from("broken");
        h.store
            .hash_set(&record_key(&job_id), &[("torrent_id", "nope".to_string())])
            .await?;
        h.store.set_add(ACTIVE_SET_KEY, job_id.as_str()).await?;

        assert!(h.coordinator.poll_once(&job_id, Trigger::Checker).await?.is_none());
        assert!(h.store.set_members(ACTIVE_SET_KEY).await?.is_empty());
        assert!(h.store.hash_get_all(&record_key(&job_id)).await?.is_empty());
        Ok(())
    }
}
