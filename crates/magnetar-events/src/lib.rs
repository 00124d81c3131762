#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs)]

//! Progress events emitted by the Magnetar coordinator.
//!
//! Layout: `payloads.rs` (event and identifier types), `codec.rs` (queue
//! encoding), `error.rs` (codec failures).

pub mod codec;
pub mod error;
pub mod payloads;

pub use codec::{decode, encode};
pub use error::{CodecError, CodecResult};
pub use payloads::{
    DownloadStatus, JobId, MESSAGE_COMPLETED, MESSAGE_FAILED, MESSAGE_IN_PROGRESS, MESSAGE_LOST,
    MESSAGE_STARTED, MESSAGE_STOPPED, ProgressEvent,
};
