#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs)]

//! Magnetar application wiring.
//!
//! Layout: `bootstrap.rs` (environment loading, task startup and shutdown),
//! `orchestrator/` (submission facade, shared poll routine, progress checker
//! and recovery sweep), `error.rs` (bootstrap and poll failures).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application and poll error types.
pub mod error;
/// Download orchestration and the polling loops.
pub mod orchestrator;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult, PollError};
pub use orchestrator::{Coordinator, CoordinatorParts};
