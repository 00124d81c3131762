#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs)]

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (env/helpers), mocks.rs (scripted backends and
//! fault-injecting stores), redis.rs (opt-in live Redis fixture).

pub mod fixtures;
pub mod mocks;
pub mod redis;

pub use fixtures::{backend_status, magnet_uri};
pub use mocks::{AddCall, FaultyStore, RefreshScript, ScriptedBackend, ScriptedRefresher, StatusScript};
pub use redis::{TestRedis, redis_available};
