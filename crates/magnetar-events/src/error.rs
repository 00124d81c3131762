//! Codec error primitives.

use thiserror::Error;

/// Error emitted when a progress event cannot cross the queue boundary.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serializing the event into its archived form failed.
    #[error("failed to encode progress event")]
    Encode {
        /// Job the event belonged to.
        job_id: String,
        /// Underlying archive error.
        #[source]
        source: rkyv::rancor::Error,
    },
    /// Queue payload was not a valid archived event.
    #[error("failed to decode progress event")]
    Decode {
        /// Length of the rejected payload.
        len: usize,
        /// Underlying validation error.
        #[source]
        source: rkyv::rancor::Error,
    },
}

/// Result wrapper for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
