//! Error types for the runtime store.

use std::time::Duration;

use magnetar_events::CodecError;
use thiserror::Error;

/// Failure raised by a key/value store or by the helpers layered on top of it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Redis rejected or failed the command.
    #[error("redis command failed")]
    Redis {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying client error.
        #[source]
        source: redis::RedisError,
    },
    /// The store did not answer within the per-call deadline.
    #[error("store call timed out")]
    Timeout {
        /// Operation identifier.
        operation: &'static str,
        /// Deadline that elapsed.
        timeout: Duration,
    },
    /// The store is unreachable for a reason other than a client error.
    #[error("store unavailable")]
    Unavailable {
        /// Operation identifier.
        operation: &'static str,
        /// Human readable detail.
        message: String,
    },
    /// A persisted job record is missing a field or holds an unparsable value.
    #[error("job record is malformed")]
    InvalidRecord {
        /// Record key.
        key: String,
        /// Offending field.
        field: &'static str,
    },
    /// A queued progress event could not be encoded or decoded.
    #[error("progress event codec failure")]
    Codec(#[from] CodecError),
}

/// Convenience alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;
