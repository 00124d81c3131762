//! HTTP routing, handlers and middleware.

pub(crate) mod downloads;
pub(crate) mod errors;
pub(crate) mod health;
pub mod router;
pub(crate) mod telemetry;

pub use downloads::DownloadRequest;
pub use errors::ProblemDetails;
