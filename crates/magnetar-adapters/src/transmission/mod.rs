//! Transmission RPC client implementing [`DownloadBackend`].

mod wire;

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use magnetar_config::TransmissionConfig;
use magnetar_torrent_core::{
    BackendError, BackendResult, BackendState, BackendStatus, DownloadBackend, TorrentHandle,
};
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::AdapterError;
use wire::{
    RpcRequest, RpcResponse, STATUS_FIELDS, TorrentAddArgs, TorrentAddResult, TorrentFields,
    TorrentGetArgs, TorrentGetResult,
};

/// Header carrying the CSRF session token negotiated with the daemon.
pub const SESSION_HEADER: &str = "x-transmission-session-id";

const RPC_SUFFIX: &str = "/transmission/rpc";
const RPC_SUCCESS: &str = "success";

/// Map Transmission's numeric status onto [`BackendState`].
///
/// 0 stopped, 1..=4 check/download queues, 5..=6 seed queue or seeding,
/// 7 is the error flag some forks report through `status`.
#[must_use]
pub const fn map_status(code: i64) -> BackendState {
    match code {
        0 => BackendState::Stopped,
        1..=4 => BackendState::InProgress,
        5 | 6 => BackendState::Done,
        7 => BackendState::Error,
        _ => BackendState::Unspecified,
    }
}

/// Thin JSON-RPC client for a Transmission daemon.
pub struct TransmissionClient {
    http: reqwest::Client,
    endpoint: String,
    username: Option<String>,
    password: Option<String>,
    session_id: RwLock<Option<String>>,
}

impl TransmissionClient {
    /// Build a client for the daemon described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unavailable`] when the HTTP client cannot be
    /// constructed.
    pub fn new(config: &TransmissionConfig, timeout: Duration) -> BackendResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| AdapterError::ClientBuild { source })?;
        Ok(Self {
            http,
            endpoint: rpc_endpoint(&config.url),
            username: config.username.clone(),
            password: config.password.clone(),
            session_id: RwLock::new(None),
        })
    }

    /// Fully qualified RPC endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<A, R>(&self, method: &'static str, arguments: A) -> Result<R, AdapterError>
    where
        A: Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        let body = RpcRequest { method, arguments };
        // One retry covers the 409 handshake; a second 409 means the daemon
        // keeps rotating or withholding the token.
        for attempt in 0..2 {
            let mut request = self.http.post(&self.endpoint).json(&body);
            if let Some(user) = &self.username {
                request = request.basic_auth(user, self.password.as_deref());
            }
            if let Some(session) = self.session_id.read().await.as_deref() {
                request = request.header(SESSION_HEADER, session);
            }

            let response = request
                .send()
                .await
                .map_err(|source| AdapterError::Transport {
                    operation: method,
                    source,
                })?;

            if response.status() == StatusCode::CONFLICT {
                let fresh = response
                    .headers()
                    .get(SESSION_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned);
                match fresh {
                    Some(session) if attempt == 0 => {
                        debug!(method, "refreshing transmission session id");
                        *self.session_id.write().await = Some(session);
                        continue;
                    }
                    _ => return Err(AdapterError::SessionHandshake { operation: method }),
                }
            }

            if !response.status().is_success() {
                return Err(AdapterError::Status {
                    operation: method,
                    status: response.status().as_u16(),
                });
            }

            let envelope: RpcResponse<R> =
                response
                    .json()
                    .await
                    .map_err(|source| AdapterError::Transport {
                        operation: method,
                        source,
                    })?;
            if envelope.result != RPC_SUCCESS {
                return Err(AdapterError::Rpc {
                    operation: method,
                    result: envelope.result,
                });
            }
            return envelope.arguments.ok_or(AdapterError::MissingField {
                operation: method,
                field: "arguments",
            });
        }
        Err(AdapterError::SessionHandshake { operation: method })
    }

    async fn torrent_add(&self, args: TorrentAddArgs<'_>) -> BackendResult<TorrentHandle> {
        let result: TorrentAddResult = self.call("torrent-add", args).await?;
        if let Some(existing) = result.duplicate {
            warn!(torrent_id = existing.id, "transmission reported duplicate torrent");
            return Ok(TorrentHandle(existing.id));
        }
        result
            .added
            .map(|added| TorrentHandle(added.id))
            .ok_or_else(|| {
                AdapterError::MissingField {
                    operation: "torrent-add",
                    field: "torrent-added",
                }
                .into()
            })
    }
}

#[async_trait]
impl DownloadBackend for TransmissionClient {
    async fn add_magnet(&self, uri: &str, download_dir: &str) -> BackendResult<TorrentHandle> {
        self.torrent_add(TorrentAddArgs {
            filename: Some(uri),
            metainfo: None,
            download_dir,
            paused: false,
        })
        .await
    }

    async fn add_file(&self, metainfo: &[u8], download_dir: &str) -> BackendResult<TorrentHandle> {
        self.torrent_add(TorrentAddArgs {
            filename: None,
            metainfo: Some(STANDARD.encode(metainfo)),
            download_dir,
            paused: false,
        })
        .await
    }

    async fn status(&self, handle: TorrentHandle) -> BackendResult<BackendStatus> {
        let result: TorrentGetResult = self
            .call(
                "torrent-get",
                TorrentGetArgs {
                    ids: [handle.0],
                    fields: STATUS_FIELDS,
                },
            )
            .await?;
        result
            .torrents
            .into_iter()
            .find(|torrent| torrent.id == handle.0)
            .map(to_status)
            .ok_or(BackendError::NotFound { handle })
    }
}

fn to_status(fields: TorrentFields) -> BackendStatus {
    BackendStatus {
        handle: TorrentHandle(fields.id),
        name: fields.name,
        state: map_status(fields.status),
        progress: (fields.percent_done * 100.0).clamp(0.0, 100.0),
        eta_seconds: i32::try_from(fields.eta).unwrap_or(i32::MAX),
        size_bytes: fields.total_size,
        downloaded_bytes: fields.have_valid.saturating_add(fields.have_unchecked),
        download_rate_bps: fields.rate_download,
    }
}

fn rpc_endpoint(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("/rpc") {
        base.to_string()
    } else {
        format!("{base}{RPC_SUFFIX}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use magnetar_config::CategoryMap;
    use serde_json::json;

    fn client_for(server: &MockServer) -> TransmissionClient {
        let config = TransmissionConfig {
            url: server.base_url(),
            username: None,
            password: None,
            download_dirs: CategoryMap::default(),
        };
        TransmissionClient::new(&config, Duration::from_secs(5)).expect("client")
    }

    #[test]
    fn status_codes_map_to_states() {
        assert_eq!(map_status(0), BackendState::Stopped);
        assert_eq!(map_status(1), BackendState::InProgress);
        assert_eq!(map_status(4), BackendState::InProgress);
        assert_eq!(map_status(5), BackendState::Done);
        assert_eq!(map_status(6), BackendState::Done);
        assert_eq!(map_status(7), BackendState::Error);
        assert_eq!(map_status(42), BackendState::Unspecified);
    }

    #[test]
    fn endpoint_appends_rpc_path_once() {
        assert_eq!(
            rpc_endpoint("http://transmission:9091/"),
            "http://transmission:9091/transmission/rpc"
        );
        assert_eq!(
            rpc_endpoint("http://transmission:9091/transmission/rpc"),
            "http://transmission:9091/transmission/rpc"
        );
    }

    #[tokio::test]
    async fn add_magnet_posts_filename_and_directory() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/transmission/rpc")
                .json_body(json!({
                    "method": "torrent-add",
                    "arguments": {
                        "filename": "magnet:?xt=urn:btih:abc",
                        "download-dir": "/downloads/films",
                        "paused": false
                    }
                }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "result": "success",
                    "arguments": { "torrent-added": { "id": 17, "name": "film", "hashString": "abc" } }
                }));
        });

        let client = client_for(&server);
        let handle = client
            .add_magnet("magnet:?xt=urn:btih:abc", "/downloads/films")
            .await
            .expect("add magnet");
        assert_eq!(handle, TorrentHandle(17));
        mock.assert();
    }

    #[tokio::test]
    async fn add_file_sends_base64_metainfo() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/transmission/rpc")
                .json_body(json!({
                    "method": "torrent-add",
                    "arguments": {
                        "metainfo": "ZDQ6aW5mb2Vl",
                        "download-dir": "/downloads/series",
                        "paused": false
                    }
                }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "result": "success",
                    "arguments": { "torrent-duplicate": { "id": 3 } }
                }));
        });

        let client = client_for(&server);
        let handle = client
            .add_file(b"d4:infoee", "/downloads/series")
            .await
            .expect("add file");
        assert_eq!(handle, TorrentHandle(3));
        mock.assert();
    }

    #[tokio::test]
    async fn session_conflict_is_retried_with_fresh_token() {
        let server = MockServer::start_async().await;
        let handshake = server.mock(|when, then| {
            when.method(POST)
                .path("/transmission/rpc")
                .header_missing(SESSION_HEADER);
            then.status(409).header(SESSION_HEADER, "token-1");
        });
        let accepted = server.mock(|when, then| {
            when.method(POST)
                .path("/transmission/rpc")
                .header(SESSION_HEADER, "token-1");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "result": "success",
                    "arguments": { "torrents": [{
                        "id": 9,
                        "status": 4,
                        "name": "show",
                        "percentDone": 0.5,
                        "totalSize": 1000,
                        "haveValid": 400,
                        "haveUnchecked": 100,
                        "rateDownload": 2048,
                        "eta": 120
                    }] }
                }));
        });

        let client = client_for(&server);
        let status = client.status(TorrentHandle(9)).await.expect("status");
        assert_eq!(status.state, BackendState::InProgress);
        assert!((status.progress - 50.0).abs() < f64::EPSILON);
        assert_eq!(status.downloaded_bytes, 500);
        assert_eq!(status.eta(), Some(Duration::from_secs(120)));
        handshake.assert();
        accepted.assert();
    }

    #[tokio::test]
    async fn empty_torrent_list_is_not_found() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/transmission/rpc");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "result": "success", "arguments": { "torrents": [] } }));
        });

        let client = client_for(&server);
        let err = client
            .status(TorrentHandle(5))
            .await
            .expect_err("missing torrent");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn rpc_failure_is_rejected() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/transmission/rpc");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "result": "invalid or corrupt torrent file" }));
        });

        let client = client_for(&server);
        let err = client
            .add_file(b"junk", "/downloads/films")
            .await
            .expect_err("rejected");
        assert!(matches!(err, BackendError::Rejected { operation: "torrent-add", .. }));
    }

    #[tokio::test]
    async fn unreachable_daemon_is_unavailable() {
        let config = TransmissionConfig {
            url: "http://127.0.0.1:9".to_string(),
            username: None,
            password: None,
            download_dirs: CategoryMap::default(),
        };
        let client =
            TransmissionClient::new(&config, Duration::from_millis(500)).expect("client");
        let err = client
            .status(TorrentHandle(1))
            .await
            .expect_err("unreachable");
        assert!(matches!(err, BackendError::Unavailable { .. }));
    }
}
