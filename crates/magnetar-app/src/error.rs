//! # Design
//!
//! - Centralize application-level errors for bootstrap and orchestration.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use magnetar_events::JobId;
use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: magnetar_config::ConfigError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: magnetar_api::ApiServerError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: magnetar_telemetry::TelemetryError,
    },
    /// Key/value store operations failed.
    #[error("store operation failed")]
    Store {
        /// Operation identifier.
        operation: &'static str,
        /// Source store error.
        source: magnetar_runtime::StoreError,
    },
    /// Download or library backend could not be set up.
    #[error("backend operation failed")]
    Backend {
        /// Operation identifier.
        operation: &'static str,
        /// Source backend error.
        source: magnetar_torrent_core::BackendError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: magnetar_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: magnetar_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: magnetar_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn store(
        operation: &'static str,
        source: magnetar_runtime::StoreError,
    ) -> Self {
        Self::Store { operation, source }
    }

    pub(crate) const fn backend(
        operation: &'static str,
        source: magnetar_torrent_core::BackendError,
    ) -> Self {
        Self::Backend { operation, source }
    }
}

/// Failure of one poll; the record is left untouched unless stated otherwise.
#[derive(Debug, Error)]
pub enum PollError {
    /// The backend could not answer; the iteration is skipped.
    #[error("backend unavailable during poll")]
    Backend {
        /// Job being polled.
        job_id: JobId,
        /// Source backend error.
        #[source]
        source: magnetar_torrent_core::BackendError,
    },
    /// A store call failed while reading or resolving the record.
    ///
    /// A terminal decision that hits this error is not rolled back; the
    /// leftover record resurfaces as stale.
    #[error("store failure during poll")]
    Store {
        /// Job being polled.
        job_id: JobId,
        /// Operation identifier.
        operation: &'static str,
        /// Source store error.
        #[source]
        source: magnetar_runtime::StoreError,
    },
}
