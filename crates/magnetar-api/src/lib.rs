#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs)]

//! Axum HTTP surface for Magnetar.
//!
//! Layout: `http/` (router, handlers, problem responses, request metrics),
//! `state.rs` (shared handler state), `error.rs` (listener failures).

pub mod error;
pub mod http;
mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
