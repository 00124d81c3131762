//! JSON envelopes exchanged with the Transmission RPC endpoint.

use serde::{Deserialize, Serialize};

/// Fields requested by `torrent-get`.
pub(crate) const STATUS_FIELDS: &[&str] = &[
    "id",
    "status",
    "name",
    "percentDone",
    "totalSize",
    "haveValid",
    "haveUnchecked",
    "rateDownload",
    "eta",
];

#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a, A> {
    pub method: &'a str,
    pub arguments: A,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse<R> {
    pub result: String,
    pub arguments: Option<R>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct TorrentAddArgs<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metainfo: Option<String>,
    pub download_dir: &'a str,
    pub paused: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TorrentAddResult {
    #[serde(rename = "torrent-added")]
    pub added: Option<AddedTorrent>,
    #[serde(rename = "torrent-duplicate")]
    pub duplicate: Option<AddedTorrent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddedTorrent {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct TorrentGetArgs<'a> {
    pub ids: [i64; 1],
    pub fields: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
pub(crate) struct TorrentGetResult {
    #[serde(default)]
    pub torrents: Vec<TorrentFields>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TorrentFields {
    pub id: i64,
    pub status: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub percent_done: f64,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub have_valid: u64,
    #[serde(default)]
    pub have_unchecked: u64,
    #[serde(default)]
    pub rate_download: u64,
    #[serde(default = "unknown_eta")]
    pub eta: i64,
}

const fn unknown_eta() -> i64 {
    -1
}
