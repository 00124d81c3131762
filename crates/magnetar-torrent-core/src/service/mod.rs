//! Backend and workflow traits implemented by adapters and the orchestrator.

use async_trait::async_trait;
use magnetar_events::ProgressEvent;

use crate::error::{BackendResult, SubmitResult};
use crate::model::{
    BackendStatus, Category, RefreshReport, SubmitDownload, TorrentHandle, TorrentSource,
};

/// Download engine capability (e.g. Transmission).
#[async_trait]
pub trait DownloadBackend: Send + Sync {
    /// Admit a magnet link, storing its payload under `download_dir`.
    async fn add_magnet(&self, uri: &str, download_dir: &str) -> BackendResult<TorrentHandle>;

    /// Admit a `.torrent` file, storing its payload under `download_dir`.
    async fn add_file(&self, metainfo: &[u8], download_dir: &str) -> BackendResult<TorrentHandle>;

    /// Fetch the current snapshot for `handle`.
    ///
    /// Implementations return [`crate::BackendError::NotFound`] once the
    /// backend has forgotten the transfer.
    async fn status(&self, handle: TorrentHandle) -> BackendResult<BackendStatus>;

    /// Dispatch on the source kind.
    async fn add(&self, source: &TorrentSource, download_dir: &str) -> BackendResult<TorrentHandle> {
        match source {
            TorrentSource::Magnet { uri } => self.add_magnet(uri, download_dir).await,
            TorrentSource::Metainfo { bytes } => self.add_file(bytes, download_dir).await,
        }
    }
}

/// Media library capability triggered after a download completes.
#[async_trait]
pub trait LibraryRefresher: Send + Sync {
    /// Ask the library to rescan the section mapped to `category`.
    ///
    /// A reachable library that declines the rescan yields an unsuccessful
    /// [`RefreshReport`]; transport failures surface as errors.
    async fn refresh_category(&self, category: Category) -> BackendResult<RefreshReport>;
}

/// Entry point used by request handlers to register new downloads.
#[async_trait]
pub trait DownloadWorkflow: Send + Sync {
    /// Hand the item to the backend, record the job and return its initial event.
    async fn submit(&self, request: SubmitDownload) -> SubmitResult<ProgressEvent>;
}
