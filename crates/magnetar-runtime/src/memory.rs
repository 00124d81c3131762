//! In-process [`KeyValueStore`] used by tests and single-node development runs.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::StoreResult;
use crate::kv::KeyValueStore;

#[derive(Debug, Default)]
struct MemoryState {
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, BTreeSet<String>>,
    lists: HashMap<String, VecDeque<Vec<u8>>>,
    expiries: HashMap<String, Instant>,
}

impl MemoryState {
    fn purge_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .expiries
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.remove(&key);
        }
    }

    fn remove(&mut self, key: &str) {
        self.hashes.remove(key);
        self.sets.remove(key);
        self.lists.remove(key);
        self.expiries.remove(key);
    }

    fn exists(&self, key: &str) -> bool {
        self.hashes.contains_key(key) || self.sets.contains_key(key) || self.lists.contains_key(key)
    }
}

/// Mutex-guarded map store with lazy key expiry on `tokio` time.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in the list at `key`.
    pub async fn list_len(&self, key: &str) -> usize {
        let mut state = self.state.lock().await;
        state.purge_expired();
        state.lists.get(key).map_or(0, VecDeque::len)
    }

    /// Remaining time-to-live of `key`, when one is set.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let mut state = self.state.lock().await;
        state.purge_expired();
        state
            .expiries
            .get(key)
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut state = self.state.lock().await;
        state.purge_expired();
        Ok(state.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.purge_expired();
        let hash = state.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert((*field).to_string(), value.clone());
        }
        Ok(())
    }

    async fn hash_set_existing(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        state.purge_expired();
        Ok(match state.hashes.get_mut(key) {
            Some(hash) => {
                hash.insert(field.to_string(), value.to_string());
                true
            }
            None => false,
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.remove(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut state = self.state.lock().await;
        state.purge_expired();
        let keys: BTreeSet<String> = state
            .hashes
            .keys()
            .chain(state.sets.keys())
            .chain(state.lists.keys())
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        Ok(keys.into_iter().collect())
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.purge_expired();
        state
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.purge_expired();
        if let Some(set) = state.sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                state.remove(key);
            }
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut state = self.state.lock().await;
        state.purge_expired();
        Ok(state
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_push(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.purge_expired();
        state
            .lists
            .entry(key.to_string())
            .or_default()
            .push_back(value.to_vec());
        Ok(())
    }

    async fn list_pop(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut state = self.state.lock().await;
        state.purge_expired();
        let Some(list) = state.lists.get_mut(key) else {
            return Ok(None);
        };
        let head = list.pop_front();
        if list.is_empty() {
            state.remove(key);
        }
        Ok(head)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.purge_expired();
        if state.exists(key) {
            state.expiries.insert(key.to_string(), Instant::now() + ttl);
        }
        Ok(())
    }
}
