//! Test fixtures and builders.

use magnetar_torrent_core::{BackendState, BackendStatus, TorrentHandle};

/// Backend snapshot with sensible byte counters for `progress`.
#[must_use]
pub fn backend_status(
    handle: i64,
    state: BackendState,
    progress: f64,
    eta_seconds: i32,
) -> BackendStatus {
    let size_bytes = 1_000_000_u64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let downloaded_bytes = ((progress.clamp(0.0, 100.0) / 100.0) * 1_000_000.0) as u64;
    BackendStatus {
        handle: TorrentHandle(handle),
        name: format!("torrent-{handle}"),
        state,
        progress,
        eta_seconds,
        size_bytes,
        downloaded_bytes,
        download_rate_bps: 0,
    }
}

/// Well-formed magnet link tagged with `tag`.
#[must_use]
pub fn magnet_uri(tag: &str) -> String {
    format!("magnet:?xt=urn:btih:{tag}&dn={tag}")
}
