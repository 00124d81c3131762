#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs)]

//! Durable state for in-flight downloads.
//!
//! Layout: `kv.rs` (store capability), `redis_store.rs` and `memory.rs`
//! (implementations), `jobs.rs` (job records and the active set), `queue.rs`
//! (progress queue), `error.rs`.

pub mod error;
pub mod jobs;
pub mod kv;
pub mod memory;
pub mod queue;
pub mod redis_store;

pub use error::{StoreError, StoreResult};
pub use jobs::{ACTIVE_SET_KEY, JobRecord, JobStore, RECORD_KEY_PREFIX, RecordScan, record_key};
pub use kv::KeyValueStore;
pub use memory::MemoryStore;
pub use queue::{DEFAULT_QUEUE_TTL, PROGRESS_QUEUE_KEY, ProgressQueue};
pub use redis_store::{RedisStore, connection_url};
