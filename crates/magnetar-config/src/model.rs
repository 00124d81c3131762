//! Typed configuration models.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use magnetar_torrent_core::Category;

/// Per-category values such as download directories or library sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMap<T> {
    entries: HashMap<Category, T>,
}

impl<T> CategoryMap<T> {
    /// Value configured for `category`.
    #[must_use]
    pub fn get(&self, category: Category) -> Option<&T> {
        self.entries.get(&category)
    }

    /// Number of configured categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no category is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for CategoryMap<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> FromIterator<(Category, T)> for CategoryMap<T> {
    fn from_iter<I: IntoIterator<Item = (Category, T)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_addr: IpAddr,
    /// Listen port.
    pub port: u16,
}

impl ServerConfig {
    /// Socket address the API server binds to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

/// Key/value store connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// `host:port` or `redis://` URL.
    pub url: String,
    /// Optional password.
    pub password: Option<String>,
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("url", &self.url)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Transmission RPC settings.
#[derive(Clone, PartialEq, Eq)]
pub struct TransmissionConfig {
    /// Base URL of the daemon, e.g. `http://transmission:9091`.
    pub url: String,
    /// Optional basic-auth user.
    pub username: Option<String>,
    /// Optional basic-auth password.
    pub password: Option<String>,
    /// Download directory per category.
    pub download_dirs: CategoryMap<String>,
}

impl fmt::Debug for TransmissionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransmissionConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("download_dirs", &self.download_dirs)
            .finish()
    }
}

/// Plex library settings.
#[derive(Clone, PartialEq, Eq)]
pub struct PlexConfig {
    /// Base URL of the server, e.g. `http://plex:32400`.
    pub url: String,
    /// `X-Plex-Token` value.
    pub token: String,
    /// Library section id per category.
    pub sections: CategoryMap<String>,
}

impl fmt::Debug for PlexConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlexConfig")
            .field("url", &self.url)
            .field("token", &"***")
            .field("sections", &self.sections)
            .finish()
    }
}

/// Timing knobs for the polling loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Base tick of the progress checker.
    pub progress_interval: Duration,
    /// Tick of the stale-record sweep.
    pub recovery_interval: Duration,
    /// Age after which a record counts as stale.
    pub stale_threshold: Duration,
    /// Buffer added to backend ETAs before re-polling.
    pub eta_slack: Duration,
    /// Deadline applied to every backend and store call.
    pub call_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            progress_interval: crate::defaults::PROGRESS_CHECK_INTERVAL,
            recovery_interval: crate::defaults::RECOVERY_CHECK_INTERVAL,
            stale_threshold: crate::defaults::STALE_THRESHOLD,
            eta_slack: crate::defaults::ETA_SLACK,
            call_timeout: crate::defaults::CALL_TIMEOUT,
        }
    }
}

/// Fully validated process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// HTTP listener.
    pub server: ServerConfig,
    /// Key/value store.
    pub redis: RedisConfig,
    /// Download backend.
    pub transmission: TransmissionConfig,
    /// Library backend.
    pub plex: PlexConfig,
    /// Loop timings.
    pub scheduler: SchedulerConfig,
    /// Rolling expiry of the progress queue.
    pub queue_ttl: Duration,
    /// Requested log format (`json` or `pretty`); inferred when absent.
    pub log_format: Option<String>,
}
