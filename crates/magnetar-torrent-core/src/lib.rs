#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs)]

//! Backend-agnostic download interfaces and DTOs.
//!
//! Layout: `model/` (categories, sources, backend snapshots), `service/`
//! (capability traits), `error.rs` (backend and submission errors).

pub mod error;
pub mod model;
pub mod service;

pub use error::{
    BackendError, BackendResult, BoxError, InvalidCategory, SubmitError, SubmitResult,
};
pub use model::{
    BackendState, BackendStatus, Category, RefreshReport, RequestedCategory, SubmitDownload,
    TorrentHandle, TorrentSource,
};
pub use service::{DownloadBackend, DownloadWorkflow, LibraryRefresher};
