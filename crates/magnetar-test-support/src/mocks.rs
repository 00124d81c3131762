//! Scripted capability implementations for orchestration tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use magnetar_runtime::{KeyValueStore, MemoryStore, StoreError, StoreResult};
use magnetar_torrent_core::{
    BackendError, BackendResult, BackendStatus, Category, DownloadBackend, LibraryRefresher,
    RefreshReport, TorrentHandle,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn scripted_failure(operation: &'static str) -> BackendError {
    BackendError::unavailable(operation, "scripted failure")
}

/// One scripted answer to [`DownloadBackend::status`].
#[derive(Debug, Clone)]
pub enum StatusScript {
    /// Return this snapshot.
    Status(BackendStatus),
    /// Report the transfer as unknown.
    NotFound,
    /// Fail with a transport error.
    Unavailable,
    /// Return this snapshot after sleeping for the given time.
    Delayed(Duration, BackendStatus),
    /// Never answer.
    Hang,
}

/// Item admitted through [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddCall {
    /// `magnet` or `file`.
    pub kind: &'static str,
    /// Directory requested by the caller.
    pub download_dir: String,
    /// Handle handed back.
    pub handle: TorrentHandle,
}

/// Download backend that replays scripted status answers per handle.
///
/// Each `status` call consumes the head of the handle's script; the last
/// entry repeats once the script is down to one answer. Handles without a
/// script report `NotFound`.
#[derive(Debug)]
pub struct ScriptedBackend {
    next_handle: AtomicI64,
    fail_adds: AtomicBool,
    adds: Mutex<Vec<AddCall>>,
    scripts: Mutex<HashMap<TorrentHandle, VecDeque<StatusScript>>>,
    status_calls: Mutex<HashMap<TorrentHandle, usize>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            next_handle: AtomicI64::new(1),
            fail_adds: AtomicBool::new(false),
            adds: Mutex::new(Vec::new()),
            scripts: Mutex::new(HashMap::new()),
            status_calls: Mutex::new(HashMap::new()),
        }
    }
}

impl ScriptedBackend {
    /// Backend handing out handles from 1 upwards.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent add fail with a transport error.
    pub fn fail_adds(&self, fail: bool) {
        self.fail_adds.store(fail, Ordering::SeqCst);
    }

    /// Replace the status script for `handle`.
    pub fn script(&self, handle: TorrentHandle, answers: impl IntoIterator<Item = StatusScript>) {
        lock(&self.scripts).insert(handle, answers.into_iter().collect());
    }

    /// Items admitted so far.
    #[must_use]
    pub fn adds(&self) -> Vec<AddCall> {
        lock(&self.adds).clone()
    }

    /// Number of status calls made for `handle`.
    #[must_use]
    pub fn status_calls(&self, handle: TorrentHandle) -> usize {
        lock(&self.status_calls).get(&handle).copied().unwrap_or(0)
    }

    fn admit(&self, kind: &'static str, download_dir: &str) -> BackendResult<TorrentHandle> {
        if self.fail_adds.load(Ordering::SeqCst) {
            return Err(scripted_failure("torrent-add"));
        }
        let handle = TorrentHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        lock(&self.adds).push(AddCall {
            kind,
            download_dir: download_dir.to_string(),
            handle,
        });
        Ok(handle)
    }
}

#[async_trait]
impl DownloadBackend for ScriptedBackend {
    async fn add_magnet(&self, _uri: &str, download_dir: &str) -> BackendResult<TorrentHandle> {
        self.admit("magnet", download_dir)
    }

    async fn add_file(&self, _metainfo: &[u8], download_dir: &str) -> BackendResult<TorrentHandle> {
        self.admit("file", download_dir)
    }

    async fn status(&self, handle: TorrentHandle) -> BackendResult<BackendStatus> {
        *lock(&self.status_calls).entry(handle).or_insert(0) += 1;
        let answer = {
            let mut scripts = lock(&self.scripts);
            match scripts.get_mut(&handle) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        match answer {
            Some(StatusScript::Status(status)) => Ok(status),
            Some(StatusScript::Delayed(delay, status)) => {
                tokio::time::sleep(delay).await;
                Ok(status)
            }
            Some(StatusScript::Hang) => std::future::pending().await,
            Some(StatusScript::Unavailable) => Err(scripted_failure("torrent-get")),
            Some(StatusScript::NotFound) | None => Err(BackendError::NotFound { handle }),
        }
    }
}

/// One scripted answer to [`LibraryRefresher::refresh_category`].
#[derive(Debug, Clone)]
pub enum RefreshScript {
    /// Library accepted the rescan.
    Accept,
    /// Library answered but declined with this message.
    Decline(String),
    /// Library was unreachable.
    Unavailable,
    /// Library never answered.
    Hang,
}

/// Library refresher that records requests and replays scripted answers.
///
/// Answers are consumed in order; once exhausted every refresh succeeds.
#[derive(Debug, Default)]
pub struct ScriptedRefresher {
    answers: Mutex<VecDeque<RefreshScript>>,
    calls: Mutex<Vec<Category>>,
}

impl ScriptedRefresher {
    /// Refresher that accepts every request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue answers for upcoming refreshes.
    pub fn script(&self, answers: impl IntoIterator<Item = RefreshScript>) {
        lock(&self.answers).extend(answers);
    }

    /// Categories refreshed so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Category> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl LibraryRefresher for ScriptedRefresher {
    async fn refresh_category(&self, category: Category) -> BackendResult<RefreshReport> {
        lock(&self.calls).push(category);
        let answer = lock(&self.answers).pop_front();
        match answer.unwrap_or(RefreshScript::Accept) {
            RefreshScript::Accept => Ok(RefreshReport::succeeded(format!("refreshed {category}"))),
            RefreshScript::Decline(message) => Ok(RefreshReport::failed(message)),
            RefreshScript::Unavailable => Err(scripted_failure("library.refresh")),
            RefreshScript::Hang => std::future::pending().await,
        }
    }
}

/// [`MemoryStore`] wrapper that fails selected operations on demand.
///
/// Operation names match the trait methods, e.g. `list_push` or `set_add`.
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    failing: Mutex<HashSet<&'static str>>,
}

impl FaultyStore {
    /// Healthy store over a fresh [`MemoryStore`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Underlying memory store, for assertions that bypass fault injection.
    #[must_use]
    pub fn inner(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.inner)
    }

    /// Start failing `operation`.
    pub fn fail(&self, operation: &'static str) {
        lock(&self.failing).insert(operation);
    }

    /// Stop failing `operation`.
    pub fn heal(&self, operation: &'static str) {
        lock(&self.failing).remove(operation);
    }

    fn check(&self, operation: &'static str) -> StoreResult<()> {
        if lock(&self.failing).contains(operation) {
            return Err(StoreError::Unavailable {
                operation,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FaultyStore {
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.check("hash_get_all")?;
        self.inner.hash_get_all(key).await
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        self.check("hash_set")?;
        self.inner.hash_set(key, fields).await
    }

    async fn hash_set_existing(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        self.check("hash_set_existing")?;
        self.inner.hash_set_existing(key, field, value).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.check("delete")?;
        self.inner.delete(key).await
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.check("scan_prefix")?;
        self.inner.scan_prefix(prefix).await
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()> {
        self.check("set_add")?;
        self.inner.set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<()> {
        self.check("set_remove")?;
        self.inner.set_remove(key, member).await
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        self.check("set_members")?;
        self.inner.set_members(key).await
    }

    async fn list_push(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.check("list_push")?;
        self.inner.list_push(key, value).await
    }

    async fn list_pop(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.check("list_pop")?;
        self.inner.list_pop(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        self.check("expire")?;
        self.inner.expire(key, ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::backend_status;
    use magnetar_torrent_core::BackendState;

    #[tokio::test]
    async fn scripted_backend_replays_and_repeats_last_answer() -> anyhow::Result<()> {
        let backend = ScriptedBackend::new();
        let handle = backend.add_magnet("magnet:?xt=urn:btih:a", "/films").await?;
        assert_eq!(handle, TorrentHandle(1));
        backend.script(
            handle,
            [
                StatusScript::Status(backend_status(1, BackendState::InProgress, 10.0, 30)),
                StatusScript::NotFound,
            ],
        );

        assert_eq!(backend.status(handle).await?.progress, 10.0);
        assert!(backend.status(handle).await.is_err_and(|err| err.is_not_found()));
        assert!(backend.status(handle).await.is_err_and(|err| err.is_not_found()));
        assert_eq!(backend.status_calls(handle), 3);
        assert_eq!(backend.adds()[0].kind, "magnet");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn scripted_backend_delays_and_hangs_on_request() -> anyhow::Result<()> {
        let backend = ScriptedBackend::new();
        let handle = TorrentHandle(9);
        backend.script(
            handle,
            [
                StatusScript::Delayed(
                    Duration::from_secs(10),
                    backend_status(9, BackendState::Done, 100.0, 0),
                ),
                StatusScript::Hang,
            ],
        );

        let started = tokio::time::Instant::now();
        assert_eq!(backend.status(handle).await?.state, BackendState::Done);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        let hung = tokio::time::timeout(Duration::from_secs(60), backend.status(handle)).await;
        assert!(hung.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn scripted_backend_can_refuse_adds() {
        let backend = ScriptedBackend::new();
        backend.fail_adds(true);
        assert!(backend.add_file(b"d4:infoe", "/films").await.is_err());
        assert!(backend.adds().is_empty());
    }

    #[tokio::test]
    async fn scripted_refresher_falls_back_to_accept() -> anyhow::Result<()> {
        let refresher = ScriptedRefresher::new();
        refresher.script([RefreshScript::Decline("busy".to_string())]);
        assert!(!refresher.refresh_category(Category::Films).await?.success);
        assert!(refresher.refresh_category(Category::Series).await?.success);
        assert_eq!(refresher.calls(), vec![Category::Films, Category::Series]);
        Ok(())
    }

    #[tokio::test]
    async fn faulty_store_fails_only_selected_operations() -> anyhow::Result<()> {
        let store = FaultyStore::new();
        store.fail("list_push");
        assert!(store.list_push("queue", b"x").await.is_err());
        store.set_add("set", "a").await?;
        store.heal("list_push");
        store.list_push("queue", b"x").await?;
        assert_eq!(store.inner().list_len("queue").await, 1);
        Ok(())
    }
}
