//! Download orchestration: the submission facade, the shared poll routine and
//! the two schedulers that drive it.
//!
//! All durable state lives behind [`JobStore`] and [`ProgressQueue`]; the only
//! in-process bookkeeping is the recovery monitor registry and the tracker
//! that owns the monitor tasks.

mod checker;
mod facade;
mod poller;
mod recovery;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use magnetar_config::{CategoryMap, SchedulerConfig};
use magnetar_events::ProgressEvent;
use magnetar_runtime::{JobStore, ProgressQueue};
use magnetar_telemetry::Metrics;
use magnetar_torrent_core::{BackendError, BackendResult, DownloadBackend, LibraryRefresher};
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

pub use checker::{adaptive_sleep, spawn_checker};
pub use poller::{PollOutcome, Trigger};
pub use recovery::{MonitorRegistry, is_stale, monitor_interval, spawn_recovery};

/// Collaborators required to build a [`Coordinator`].
pub struct CoordinatorParts {
    /// Download engine.
    pub backend: Arc<dyn DownloadBackend>,
    /// Media library refreshed after completion.
    pub refresher: Arc<dyn LibraryRefresher>,
    /// Job records and the active set.
    pub jobs: JobStore,
    /// Durable progress queue.
    pub queue: ProgressQueue,
    /// Metrics registry.
    pub metrics: Metrics,
    /// Download directory per category.
    pub download_dirs: CategoryMap<String>,
    /// Loop timings and per-call deadline.
    pub scheduler: SchedulerConfig,
}

/// Shared state behind the facade, the poller and both loops.
pub struct Coordinator {
    backend: Arc<dyn DownloadBackend>,
    refresher: Arc<dyn LibraryRefresher>,
    jobs: JobStore,
    queue: ProgressQueue,
    metrics: Metrics,
    download_dirs: CategoryMap<String>,
    scheduler: SchedulerConfig,
    monitors: MonitorRegistry,
    monitor_tasks: TaskTracker,
}

impl Coordinator {
    /// Assemble a coordinator from its collaborators.
    #[must_use]
    pub fn new(parts: CoordinatorParts) -> Self {
        let CoordinatorParts {
            backend,
            refresher,
            jobs,
            queue,
            metrics,
            download_dirs,
            scheduler,
        } = parts;
        Self {
            backend,
            refresher,
            jobs,
            queue,
            metrics,
            download_dirs,
            scheduler,
            monitors: MonitorRegistry::default(),
            monitor_tasks: TaskTracker::new(),
        }
    }

    /// Loop timings in effect.
    #[must_use]
    pub const fn scheduler(&self) -> &SchedulerConfig {
        &self.scheduler
    }

    /// Registry of running recovery monitors.
    #[must_use]
    pub const fn monitors(&self) -> &MonitorRegistry {
        &self.monitors
    }

    /// Wait for every recovery monitor to finish.
    ///
    /// Call once the shutdown token is cancelled and the recovery loop has
    /// stopped. A monitor in the middle of a poll completes it before exiting.
    pub async fn drain_monitors(&self) {
        self.monitor_tasks.close();
        debug!(pending = self.monitor_tasks.len(), "draining recovery monitors");
        self.monitor_tasks.wait().await;
    }

    /// Run a backend call under the per-call deadline.
    async fn backend_call<T, F>(&self, operation: &'static str, call: F) -> BackendResult<T>
    where
        F: Future<Output = BackendResult<T>> + Send,
    {
        let timeout = self.scheduler.call_timeout;
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| BackendError::Timeout { operation, timeout })?
    }

    /// Append `event` to the progress queue. Failures are logged and counted only.
    async fn publish(&self, event: &ProgressEvent) {
        match self.queue.publish(event).await {
            Ok(()) => self.metrics.inc_event_published(event.kind()),
            Err(err) => {
                self.metrics.inc_publish_failure();
                warn!(
                    error = %err,
                    job_id = %event.job_id,
                    kind = event.kind(),
                    "failed to publish progress event"
                );
            }
        }
    }
}

/// Backend ETA padded with the configured slack.
pub(crate) fn eta_with_slack(eta: Duration, slack: Duration) -> Duration {
    eta.saturating_add(slack)
}
