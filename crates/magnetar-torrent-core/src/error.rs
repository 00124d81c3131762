//! Error types for torrent core services.

use std::error::Error;
use std::time::Duration;

use thiserror::Error;

use crate::model::TorrentHandle;

/// Boxed source error carried across crate boundaries.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Category value that does not name a known category.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized download category")]
pub struct InvalidCategory {
    /// Value supplied by the caller.
    pub value: String,
}

/// Failure reported by the download or library backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend no longer knows the handle.
    #[error("torrent not found")]
    NotFound {
        /// Missing handle.
        handle: TorrentHandle,
    },
    /// The backend could not be reached or returned a transport failure.
    #[error("backend unavailable")]
    Unavailable {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
    /// The backend answered but refused the request.
    #[error("backend rejected request")]
    Rejected {
        /// Operation identifier.
        operation: &'static str,
        /// Backend supplied detail.
        message: String,
    },
    /// The call did not complete within the configured deadline.
    #[error("backend call timed out")]
    Timeout {
        /// Operation identifier.
        operation: &'static str,
        /// Deadline that elapsed.
        timeout: Duration,
    },
}

impl BackendError {
    /// Wrap a transport error.
    pub fn unavailable(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Unavailable {
            operation,
            source: source.into(),
        }
    }

    /// Whether the backend reported the transfer as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience alias for backend results.
pub type BackendResult<T> = Result<T, BackendError>;

/// Error returned by the orchestration facade when a submission is refused.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Category was not recognized; nothing was sent to the backend.
    #[error("invalid category")]
    InvalidCategory(#[from] InvalidCategory),
    /// The download backend refused or could not take the item; nothing was persisted.
    #[error("download backend unavailable")]
    BackendUnavailable {
        /// Underlying backend failure.
        #[source]
        source: BackendError,
    },
    /// The backend accepted the item but the job could not be recorded.
    #[error("failed to record download job")]
    Store {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying store failure.
        #[source]
        source: BoxError,
    },
}

/// Convenience alias for submission results.
pub type SubmitResult<T> = Result<T, SubmitError>;
