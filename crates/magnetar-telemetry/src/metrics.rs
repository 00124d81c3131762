//! Prometheus-backed metrics registry and snapshot helpers.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    submissions_total: IntCounterVec,
    polls_total: IntCounterVec,
    events_published_total: IntCounterVec,
    publish_failures_total: IntCounter,
    stale_records_total: IntCounter,
    active_jobs: IntGauge,
    recovery_monitors: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Size of the active-job set at the last checker sweep.
    pub active_jobs: i64,
    /// Recovery monitors currently running.
    pub recovery_monitors: i64,
    /// Progress events that could not be queued.
    pub publish_failures_total: u64,
    /// Stale records found by the recovery sweep.
    pub stale_records_total: u64,
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::CollectorBuild { name, source })
}

fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::CollectorBuild { name, source })
}

fn gauge(name: &'static str, help: &str) -> Result<IntGauge> {
    IntGauge::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::CollectorBuild { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::CollectorRegister { name, source })
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = counter_vec(
            "http_requests_total",
            "Total HTTP requests received",
            &["route", "code"],
        )?;
        let submissions_total = counter_vec(
            "download_submissions_total",
            "Download submissions by result",
            &["result"],
        )?;
        let polls_total = counter_vec(
            "download_polls_total",
            "Backend polls by outcome",
            &["outcome"],
        )?;
        let events_published_total = counter_vec(
            "progress_events_published_total",
            "Progress events appended to the queue by kind",
            &["kind"],
        )?;
        let publish_failures_total = counter(
            "progress_publish_failures_total",
            "Progress events that could not be queued",
        )?;
        let stale_records_total = counter(
            "stale_records_total",
            "Stale job records detected by the recovery sweep",
        )?;
        let active_jobs = gauge("active_jobs", "Jobs in the active set at the last sweep")?;
        let recovery_monitors = gauge("recovery_monitors", "Recovery monitors currently running")?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(&registry, "download_submissions_total", &submissions_total)?;
        register(&registry, "download_polls_total", &polls_total)?;
        register(
            &registry,
            "progress_events_published_total",
            &events_published_total,
        )?;
        register(
            &registry,
            "progress_publish_failures_total",
            &publish_failures_total,
        )?;
        register(&registry, "stale_records_total", &stale_records_total)?;
        register(&registry, "active_jobs", &active_jobs)?;
        register(&registry, "recovery_monitors", &recovery_monitors)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                submissions_total,
                polls_total,
                events_published_total,
                publish_failures_total,
                stale_records_total,
                active_jobs,
                recovery_monitors,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Count a submission outcome (`accepted`, `invalid`, `backend_unavailable`, `store_failed`).
    pub fn inc_submission(&self, result: &str) {
        self.inner
            .submissions_total
            .with_label_values(&[result])
            .inc();
    }

    /// Count one backend poll by outcome.
    pub fn inc_poll(&self, outcome: &str) {
        self.inner.polls_total.with_label_values(&[outcome]).inc();
    }

    /// Count a queued progress event.
    pub fn inc_event_published(&self, kind: &str) {
        self.inner
            .events_published_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Count a progress event that could not be queued.
    pub fn inc_publish_failure(&self) {
        self.inner.publish_failures_total.inc();
    }

    /// Count a stale record found by the recovery sweep.
    pub fn inc_stale_record(&self) {
        self.inner.stale_records_total.inc();
    }

    /// Set the active job gauge.
    pub fn set_active_jobs(&self, count: usize) {
        self.inner
            .active_jobs
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Track a recovery monitor starting.
    pub fn monitor_started(&self) {
        self.inner.recovery_monitors.inc();
    }

    /// Track a recovery monitor exiting.
    pub fn monitor_stopped(&self) {
        self.inner.recovery_monitors.dec();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::ExpositionEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::ExpositionUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_jobs: self.inner.active_jobs.get(),
            recovery_monitors: self.inner.recovery_monitors.get(),
            publish_failures_total: self.inner.publish_failures_total.get(),
            stale_records_total: self.inner.stale_records_total.get(),
        }
    }
}
