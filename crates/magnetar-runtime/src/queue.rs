//! Durable FIFO of encoded progress events.

use std::sync::Arc;
use std::time::Duration;

use magnetar_events::{ProgressEvent, decode, encode};

use crate::error::StoreResult;
use crate::kv::KeyValueStore;

/// List key consumed by the chat front-end.
pub const PROGRESS_QUEUE_KEY: &str = "coordinator-bot:download:progress";
/// Rolling expiry applied to the queue after each append.
pub const DEFAULT_QUEUE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Append-only progress queue with a rolling expiry.
#[derive(Clone)]
pub struct ProgressQueue {
    store: Arc<dyn KeyValueStore>,
    key: String,
    ttl: Duration,
}

impl ProgressQueue {
    /// Queue at [`PROGRESS_QUEUE_KEY`] expiring `ttl` after the last append.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self::with_key(store, PROGRESS_QUEUE_KEY, ttl)
    }

    /// Queue stored under a custom key.
    #[must_use]
    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            ttl,
        }
    }

    /// Key the queue lives under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Encode `event`, append it and refresh the queue expiry.
    ///
    /// # Errors
    ///
    /// Returns an error when encoding or either store call fails.
    pub async fn publish(&self, event: &ProgressEvent) -> StoreResult<()> {
        let bytes = encode(event)?;
        self.store.list_push(&self.key, &bytes).await?;
        self.store.expire(&self.key, self.ttl).await
    }

    /// Remove and decode the oldest queued event.
    ///
    /// # Errors
    ///
    /// Returns an error when the store fails or the entry cannot be decoded;
    /// an undecodable entry is consumed either way.
    pub async fn pop(&self) -> StoreResult<Option<ProgressEvent>> {
        match self.store.list_pop(&self.key).await? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }
}
