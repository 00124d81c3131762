//! Key/value capability consumed by the job store and progress queue.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Atomic single-key operations over hashes, sets and lists.
///
/// No operation spans more than one key; callers compose them without
/// cross-key transactions.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read every field of the hash at `key`; an absent key yields an empty map.
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// Write `fields` into the hash at `key`, creating it when absent.
    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()>;

    /// Write one field only when the hash at `key` already exists.
    ///
    /// Returns `false` without creating anything when the key is absent.
    async fn hash_set_existing(&self, key: &str, field: &str, value: &str) -> StoreResult<bool>;

    /// Remove `key` regardless of its type.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// List keys beginning with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Add `member` to the set at `key`.
    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()>;

    /// Remove `member` from the set at `key`.
    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<()>;

    /// Read every member of the set at `key`.
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Append `value` to the tail of the list at `key`.
    async fn list_push(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Remove and return the head of the list at `key`.
    async fn list_pop(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Reset the time-to-live of `key`.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()>;
}
