//! Steady-state sweep over the active-job set with ETA-driven early re-sweeps.

use std::sync::Arc;
use std::time::Duration;

use magnetar_telemetry::job_span;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use super::{Coordinator, Trigger, eta_with_slack};

/// Delay before an early re-sweep, when the soonest ETA lands before the next tick.
///
/// `None` means waiting for the regular tick.
#[must_use]
pub fn adaptive_sleep(
    min_eta: Option<Duration>,
    slack: Duration,
    base: Duration,
) -> Option<Duration> {
    min_eta
        .map(|eta| eta_with_slack(eta, slack))
        .filter(|delay| *delay < base)
}

impl Coordinator {
    /// Poll every job in the active set once.
    ///
    /// Returns the smallest ETA among jobs that are still running.
    pub async fn sweep_active(&self) -> Option<Duration> {
        let ids = match self.jobs.active_ids().await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, "failed to read active job set");
                return None;
            }
        };
        self.metrics.set_active_jobs(ids.len());

        let mut min_eta: Option<Duration> = None;
        for job_id in ids {
            let span = job_span(job_id.as_str(), Trigger::Checker.as_str());
            match self
                .poll_once(&job_id, Trigger::Checker)
                .instrument(span)
                .await
            {
                Ok(Some(outcome)) if !outcome.terminal => {
                    if let Some(eta) = outcome.eta {
                        min_eta = Some(min_eta.map_or(eta, |current| current.min(eta)));
                    }
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, job_id = %job_id, "progress poll failed"),
            }
        }
        min_eta
    }
}

/// Spawn the progress checker; it exits once `shutdown` is cancelled.
pub fn spawn_checker(
    coordinator: Arc<Coordinator>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let base = coordinator.scheduler().progress_interval;
        let slack = coordinator.scheduler().eta_slack;
        let mut ticker = tokio::time::interval_at(Instant::now() + base, base);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = base.as_secs(), "progress checker started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let mut min_eta = coordinator.sweep_active().await;
            while let Some(delay) = adaptive_sleep(min_eta, slack, base) {
                debug!(delay_secs = delay.as_secs(), "re-sweeping ahead of next tick");
                tokio::select! {
                    () = shutdown.cancelled() => {
                        info!("progress checker stopped");
                        return;
                    }
                    () = tokio::time::sleep(delay) => {}
                }
                min_eta = coordinator.sweep_active().await;
            }
        }
        info!("progress checker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::test_support::harness;
    use magnetar_runtime::KeyValueStore;
    use magnetar_test_support::{StatusScript, backend_status, magnet_uri};
    use magnetar_torrent_core::{
        BackendState, Category, DownloadWorkflow, RequestedCategory, SubmitDownload,
        TorrentSource,
    };

    const SLACK: Duration = Duration::from_secs(10);
    const BASE: Duration = Duration::from_secs(60);

    #[test]
    fn soonest_eta_plus_slack_below_base_tick_wins() {
        let etas = [30, 90, 200].map(Duration::from_secs);
        let min_eta = etas.iter().min().copied();
        assert_eq!(
            adaptive_sleep(min_eta, SLACK, BASE),
            Some(Duration::from_secs(40))
        );
    }

    #[test]
    fn long_or_missing_etas_wait_for_base_tick() {
        assert_eq!(adaptive_sleep(Some(Duration::from_secs(50)), SLACK, BASE), None);
        assert_eq!(adaptive_sleep(Some(Duration::from_secs(300)), SLACK, BASE), None);
        assert_eq!(adaptive_sleep(None, SLACK, BASE), None);
    }

    #[tokio::test]
    async fn sweep_reports_minimum_eta_of_running_jobs() -> anyhow::Result<()> {
        let h = harness();
        for eta in [200, 30, 90] {
            h.coordinator
                .submit(SubmitDownload {
                    category: RequestedCategory::from(Category::Films),
                    source: TorrentSource::magnet(magnet_uri(&eta.to_string())),
                })
                .await?;
        }
        let adds = h.backend.adds();
        for (add, eta) in adds.iter().zip([200, 30, 90]) {
            h.backend.script(
                add.handle,
                [StatusScript::Status(backend_status(
                    add.handle.0,
                    BackendState::InProgress,
                    50.0,
                    eta,
                ))],
            );
        }

        assert_eq!(h.coordinator.sweep_active().await, Some(Duration::from_secs(30)));
        assert_eq!(h.metrics.snapshot().active_jobs, 3);
        assert_eq!(h.store.list_len(h.queue.key()).await, 3);
        Ok(())
    }

    #[tokio::test]
    async fn terminal_and_unknown_etas_are_ignored() -> anyhow::Result<()> {
        let h = harness();
        for tag in ["lost", "unknown"] {
            h.coordinator
                .submit(SubmitDownload {
                    category: RequestedCategory::from(Category::Films),
                    source: TorrentSource::magnet(magnet_uri(tag)),
                })
                .await?;
        }
        let adds = h.backend.adds();
        h.backend.script(adds[0].handle, [StatusScript::NotFound]);
        h.backend.script(
            adds[1].handle,
            [StatusScript::Status(backend_status(
                adds[1].handle.0,
                BackendState::InProgress,
                5.0,
                -1,
            ))],
        );

        assert_eq!(h.coordinator.sweep_active().await, None);
        assert_eq!(h.jobs.active_ids().await?.len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn checker_resweeps_early_then_stops_on_shutdown() -> anyhow::Result<()> {
        let h = harness();
        h.coordinator
            .submit(SubmitDownload {
                category: RequestedCategory::from(Category::Films),
                source: TorrentSource::magnet(magnet_uri("fast")),
            })
            .await?;
        let handle = h.backend.adds()[0].handle;
        h.backend.script(
            handle,
            [
                StatusScript::Status(backend_status(handle.0, BackendState::InProgress, 50.0, 5)),
                StatusScript::Status(backend_status(handle.0, BackendState::Done, 100.0, 0)),
            ],
        );

        let shutdown = CancellationToken::new();
        let task = spawn_checker(h.coordinator.clone(), shutdown.clone());

        // First tick at 60s, early re-sweep 15s later resolves the job.
        tokio::time::sleep(Duration::from_secs(80)).await;
        assert_eq!(h.backend.status_calls(handle), 2);
        assert!(h.store.set_members(magnetar_runtime::ACTIVE_SET_KEY).await?.is_empty());

        shutdown.cancel();
        task.await?;
        Ok(())
    }
}
