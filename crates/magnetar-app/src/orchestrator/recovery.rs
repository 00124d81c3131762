//! Stale-record sweep and the per-job monitors it spawns.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use magnetar_events::JobId;
use magnetar_runtime::RecordScan;
use magnetar_telemetry::job_span;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use super::{Coordinator, Trigger, eta_with_slack};

/// Whether a record last updated at `last_update` is older than `threshold`.
#[must_use]
pub fn is_stale(last_update: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> bool {
    chrono::Duration::from_std(threshold)
        .is_ok_and(|threshold| now.signed_duration_since(last_update) > threshold)
}

/// Sleep between monitor polls: ETA plus slack, never longer than `ceiling`.
#[must_use]
pub fn monitor_interval(eta: Option<Duration>, slack: Duration, ceiling: Duration) -> Duration {
    eta.map_or(ceiling, |eta| eta_with_slack(eta, slack).min(ceiling))
}

/// Job ids that currently have a recovery monitor.
#[derive(Debug, Clone, Default)]
pub struct MonitorRegistry {
    running: Arc<Mutex<HashSet<JobId>>>,
}

impl MonitorRegistry {
    /// Reserve the monitor slot for `job_id`; `None` when one is already running.
    #[must_use]
    pub fn claim(&self, job_id: &JobId) -> Option<MonitorSlot> {
        let inserted = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id.clone());
        inserted.then(|| MonitorSlot {
            registry: self.clone(),
            job_id: job_id.clone(),
        })
    }

    /// Whether a monitor for `job_id` is running.
    #[must_use]
    pub fn contains(&self, job_id: &JobId) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(job_id)
    }

    /// Number of running monitors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no monitor is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Claimed monitor slot; releases the job id on drop.
#[derive(Debug)]
pub struct MonitorSlot {
    registry: MonitorRegistry,
    job_id: JobId,
}

impl Drop for MonitorSlot {
    fn drop(&mut self) {
        self.registry
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.job_id);
    }
}

impl Coordinator {
    /// Scan every persisted record and reconcile the stale ones.
    ///
    /// Records that no longer decode are deleted. Stale jobs the backend
    /// reports as finished are resolved on the spot; the rest get a monitor
    /// unless one is already running. Returns the number of monitors spawned.
    pub async fn sweep_stale(self: &Arc<Self>, shutdown: &CancellationToken) -> usize {
        let RecordScan { records, malformed } = match self.jobs.scan_records().await {
            Ok(scan) => scan,
            Err(err) => {
                warn!(error = %err, "failed to scan job records");
                return 0;
            }
        };

        for job_id in malformed {
            match self.jobs.remove(&job_id).await {
                Ok(()) => {
                    self.metrics.inc_poll("malformed");
                    warn!(job_id = %job_id, "deleted malformed job record");
                }
                Err(err) => {
                    warn!(error = %err, job_id = %job_id, "failed to delete malformed job record");
                }
            }
        }

        let now = Utc::now();
        let threshold = self.scheduler.stale_threshold;
        let mut spawned = 0;
        for record in records {
            if shutdown.is_cancelled() {
                break;
            }
            if !is_stale(record.last_update, now, threshold)
                || self.monitors.contains(&record.job_id)
            {
                continue;
            }
            self.metrics.inc_stale_record();
            let span = job_span(record.job_id.as_str(), Trigger::Recovery.as_str());
            let polled = self
                .poll_once(&record.job_id, Trigger::Recovery)
                .instrument(span.clone())
                .await;
            match polled {
                Ok(Some(outcome)) if !outcome.terminal => {
                    if let Some(slot) = self.monitors.claim(&record.job_id) {
                        span.in_scope(|| {
                            info!(last_update = %record.last_update, "spawning recovery monitor");
                        });
                        spawn_monitor(Arc::clone(self), slot, outcome.eta, shutdown.clone(), span);
                        spawned += 1;
                    }
                }
                Ok(_) => {
                    span.in_scope(|| info!("stale record resolved"));
                }
                Err(err) => {
                    warn!(error = %err, job_id = %record.job_id, "stale record poll failed");
                }
            }
        }
        spawned
    }
}

fn spawn_monitor(
    coordinator: Arc<Coordinator>,
    slot: MonitorSlot,
    first_eta: Option<Duration>,
    shutdown: CancellationToken,
    span: tracing::Span,
) {
    let tasks = coordinator.monitor_tasks.clone();
    tasks.spawn(
        async move {
            let slack = coordinator.scheduler.eta_slack;
            let ceiling = coordinator.scheduler.progress_interval;
            coordinator.metrics.monitor_started();
            let mut delay = monitor_interval(first_eta, slack, ceiling);

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
                match coordinator.poll_once(&slot.job_id, Trigger::Recovery).await {
                    Ok(Some(outcome)) if !outcome.terminal => {
                        delay = monitor_interval(outcome.eta, slack, ceiling);
                    }
                    Ok(_) => break,
                    Err(err) => {
                        warn!(error = %err, "recovery monitor poll failed");
                        delay = ceiling;
                    }
                }
            }

            coordinator.metrics.monitor_stopped();
            debug!("recovery monitor exited");
            drop(slot);
        }
        .instrument(span),
    );
}

/// Spawn the stale-record sweep; it and every monitor exit once `shutdown` is cancelled.
pub fn spawn_recovery(
    coordinator: Arc<Coordinator>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let tick = coordinator.scheduler().recovery_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = tick.as_secs(), "recovery loop started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let spawned = coordinator.sweep_stale(&shutdown).await;
            if spawned > 0 {
                info!(spawned, "recovery monitors spawned");
            }
        }
        info!("recovery loop stopped");
    })
}
