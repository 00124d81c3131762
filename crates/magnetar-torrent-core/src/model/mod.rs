//! Core torrent domain types shared across the workspace.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::InvalidCategory;

/// Content category selected by the requester.
///
/// Each category maps to a download directory on the backend and to a library
/// section refreshed once the download completes. Discriminants match the
/// integer encoding persisted in job records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Feature films.
    Films = 1,
    /// Live-action series.
    Series = 2,
    /// Animated films.
    Cartoons = 3,
    /// Animated series.
    CartoonsSeries = 4,
    /// Animated shorts.
    Shorts = 5,
}

impl Category {
    /// Every recognized category, in discriminant order.
    pub const ALL: [Self; 5] = [
        Self::Films,
        Self::Series,
        Self::Cartoons,
        Self::CartoonsSeries,
        Self::Shorts,
    ];

    /// Integer encoding stored in job records.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Lowercase label used in configuration keys and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Films => "films",
            Self::Series => "series",
            Self::Cartoons => "cartoons",
            Self::CartoonsSeries => "cartoons_series",
            Self::Shorts => "shorts",
        }
    }
}

impl Display for Category {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<i32> for Category {
    type Error = InvalidCategory;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_i32() == value)
            .ok_or_else(|| InvalidCategory {
                value: value.to_string(),
            })
    }
}

impl FromStr for Category {
    type Err = InvalidCategory;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| InvalidCategory {
                value: value.to_string(),
            })
    }
}

/// Category exactly as supplied by a caller, before validation.
///
/// Accepts either the integer discriminant or the lowercase label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestedCategory {
    /// Integer discriminant (`1..=5`).
    Code(i32),
    /// Label such as `films` or `cartoons_series`.
    Name(String),
}

impl RequestedCategory {
    /// Validate the requested value against the known categories.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCategory`] when the value does not name a category.
    pub fn resolve(&self) -> Result<Category, InvalidCategory> {
        match self {
            Self::Code(code) => Category::try_from(*code),
            Self::Name(name) => name.parse(),
        }
    }
}

impl From<Category> for RequestedCategory {
    fn from(category: Category) -> Self {
        Self::Code(category.as_i32())
    }
}

/// Source describing how a torrent should be added to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TorrentSource {
    /// Represents a magnet URI that should be fetched.
    Magnet {
        /// Magnet URI to resolve and add.
        uri: String,
    },
    /// Represents raw `.torrent` metainfo bytes.
    Metainfo {
        /// Bencoded metainfo payload.
        bytes: Vec<u8>,
    },
}

impl TorrentSource {
    #[must_use]
    /// Convenience constructor for magnet-based sources.
    pub fn magnet(uri: impl Into<String>) -> Self {
        Self::Magnet { uri: uri.into() }
    }

    #[must_use]
    /// Convenience constructor for metainfo-based sources.
    pub fn metainfo(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Metainfo {
            bytes: bytes.into(),
        }
    }

    /// Short label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Magnet { .. } => "magnet",
            Self::Metainfo { .. } => "file",
        }
    }
}

/// Backend-assigned identifier for a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TorrentHandle(pub i64);

impl Display for TorrentHandle {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Request accepted by the orchestration facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitDownload {
    /// Requested content category, validated by the facade.
    pub category: RequestedCategory,
    /// Magnet link or torrent file.
    pub source: TorrentSource,
}

/// Coarse transfer state reported by the download backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendState {
    /// Backend returned a state the coordinator does not recognize.
    Unspecified,
    /// Transfer was stopped on the backend.
    Stopped,
    /// Queued, verifying or downloading.
    InProgress,
    /// Payload fully downloaded (seeding or waiting to seed).
    Done,
    /// Backend flagged the transfer as broken.
    Error,
}

/// Snapshot returned by [`crate::DownloadBackend::status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendStatus {
    /// Handle the snapshot belongs to.
    pub handle: TorrentHandle,
    /// Display name of the transfer.
    pub name: String,
    /// Coarse state.
    pub state: BackendState,
    /// Completion percentage in `0..=100`.
    pub progress: f64,
    /// Estimated seconds remaining; negative when the backend cannot tell.
    pub eta_seconds: i32,
    /// Total payload size in bytes.
    pub size_bytes: u64,
    /// Verified bytes on disk.
    pub downloaded_bytes: u64,
    /// Current download rate in bytes per second.
    pub download_rate_bps: u64,
}

impl BackendStatus {
    /// Reported ETA when the backend supplied a positive value.
    #[must_use]
    pub fn eta(&self) -> Option<Duration> {
        u64::try_from(self.eta_seconds)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Outcome of a library refresh request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    /// Whether the library accepted the rescan.
    pub success: bool,
    /// Detail supplied by the library backend.
    pub message: String,
}

impl RefreshReport {
    /// Successful refresh.
    #[must_use]
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Refresh rejected by the library backend.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
