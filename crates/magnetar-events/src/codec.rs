//! Compact binary encoding for events stored in the progress queue.
//!
//! Events are archived with `rkyv` and validated on the way back in, so a
//! truncated or foreign queue entry surfaces as [`CodecError::Decode`] instead of
//! undefined reads.

use rkyv::rancor::Error as RkyvError;
use rkyv::util::AlignedVec;

use crate::error::{CodecError, CodecResult};
use crate::payloads::ProgressEvent;

/// Archive `event` into bytes suitable for a queue entry.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if the archive serializer fails.
pub fn encode(event: &ProgressEvent) -> CodecResult<Vec<u8>> {
    rkyv::to_bytes::<RkyvError>(event)
        .map(|bytes| bytes.to_vec())
        .map_err(|source| CodecError::Encode {
            job_id: event.job_id.to_string(),
            source,
        })
}

/// Validate and restore an event previously produced by [`encode`].
///
/// # Errors
///
/// Returns [`CodecError::Decode`] when the payload is not a valid archive.
pub fn decode(bytes: &[u8]) -> CodecResult<ProgressEvent> {
    // Queue payloads come back as plain byte buffers with no alignment guarantee.
    let mut aligned: AlignedVec = AlignedVec::with_capacity(bytes.len());
    aligned.extend_from_slice(bytes);
    rkyv::from_bytes::<ProgressEvent, RkyvError>(&aligned).map_err(|source| CodecError::Decode {
        len: bytes.len(),
        source,
    })
}
