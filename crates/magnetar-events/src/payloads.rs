//! Event payload types carried from the coordinator to downstream consumers.

use std::fmt::{self, Display, Formatter};

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message attached to the event returned at submission time.
pub const MESSAGE_STARTED: &str = "Download started";
/// Message attached to periodic progress events.
pub const MESSAGE_IN_PROGRESS: &str = "Download in progress";
/// Message emitted when the backend reports an errored transfer.
pub const MESSAGE_FAILED: &str = "Download failed";
/// Message emitted when the backend reports a stopped transfer.
pub const MESSAGE_STOPPED: &str = "Download stopped";
/// Message emitted when the backend no longer knows the transfer.
pub const MESSAGE_LOST: &str = "Download lost";
/// Message emitted after a completed download was picked up by the library.
pub const MESSAGE_COMPLETED: &str = "Download completed and library refreshed";

/// Opaque identifier for one submitted download job.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Archive,
    RkyvSerialize,
    RkyvDeserialize,
)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Allocate a fresh, globally unique identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Display for JobId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Coarse lifecycle reported to consumers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Archive,
    RkyvSerialize,
    RkyvDeserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownloadStatus {
    /// The transfer is still running.
    InProgress,
    /// Downloaded and picked up by the media library.
    Success,
    /// Terminal failure; see the event message.
    Error,
}

impl DownloadStatus {
    /// Whether no further events are expected for the job after this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    /// Wire label used in logs and JSON payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
        }
    }
}

/// Immutable snapshot of a job's progress.
///
/// Consumers receive these at least once and merge them per `job_id`; an event
/// carries no identity beyond the job it describes.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize,
)]
pub struct ProgressEvent {
    /// Job the event belongs to.
    pub job_id: JobId,
    /// Display name reported by the backend (empty until known).
    pub name: String,
    /// Reduced lifecycle status.
    pub status: DownloadStatus,
    /// Human readable detail.
    pub message: String,
    /// Completion percentage in `0..=100`.
    pub progress: f64,
    /// Estimated seconds remaining; zero when unknown.
    pub eta_seconds: i32,
}

impl ProgressEvent {
    /// Event returned to the requester once the backend accepted the item.
    #[must_use]
    pub fn started(job_id: JobId) -> Self {
        Self {
            job_id,
            name: String::new(),
            status: DownloadStatus::InProgress,
            message: MESSAGE_STARTED.to_string(),
            progress: 0.0,
            eta_seconds: 0,
        }
    }

    /// Periodic update for a running transfer. Non-positive ETAs are reported as zero.
    #[must_use]
    pub fn in_progress(job_id: JobId, name: impl Into<String>, progress: f64, eta: i32) -> Self {
        Self {
            job_id,
            name: name.into(),
            status: DownloadStatus::InProgress,
            message: MESSAGE_IN_PROGRESS.to_string(),
            progress: clamp_percent(progress),
            eta_seconds: eta.max(0),
        }
    }

    /// Terminal success after the library refresh went through.
    #[must_use]
    pub fn succeeded(job_id: JobId, name: impl Into<String>) -> Self {
        Self {
            job_id,
            name: name.into(),
            status: DownloadStatus::Success,
            message: MESSAGE_COMPLETED.to_string(),
            progress: 100.0,
            eta_seconds: 0,
        }
    }

    /// Terminal failure carrying `message`.
    #[must_use]
    pub fn failed(job_id: JobId, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job_id,
            name: name.into(),
            status: DownloadStatus::Error,
            message: message.into(),
            progress: 0.0,
            eta_seconds: 0,
        }
    }

    /// Override the reported progress, e.g. a finished download whose refresh failed.
    #[must_use]
    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = clamp_percent(progress);
        self
    }

    /// Machine-friendly discriminator used in logs and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self.status {
            DownloadStatus::InProgress => "progress",
            DownloadStatus::Success => "completed",
            DownloadStatus::Error => "failed",
        }
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
