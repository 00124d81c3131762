#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs)]

//! Environment-driven configuration for the coordinator.
//!
//! Layout: `model.rs` (typed config), `loader.rs` (environment lookup),
//! `validate.rs` (parsing helpers), `defaults.rs`.

mod defaults;
pub mod error;
mod loader;
pub mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{
    AppConfig, CategoryMap, PlexConfig, RedisConfig, SchedulerConfig, ServerConfig,
    TransmissionConfig,
};
