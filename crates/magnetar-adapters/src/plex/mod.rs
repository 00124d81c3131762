//! Plex library client implementing [`LibraryRefresher`].

use std::time::Duration;

use async_trait::async_trait;
use magnetar_config::{CategoryMap, PlexConfig};
use magnetar_torrent_core::{BackendResult, Category, LibraryRefresher, RefreshReport};
use reqwest::StatusCode;
use tracing::{info, warn};

use crate::error::AdapterError;

const TOKEN_PARAM: &str = "X-Plex-Token";

/// Triggers section rescans on a Plex Media Server.
pub struct PlexClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    sections: CategoryMap<String>,
}

impl PlexClient {
    /// Build a client for the server described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`magnetar_torrent_core::BackendError::Unavailable`] when the
    /// HTTP client cannot be constructed.
    pub fn new(config: &PlexConfig, timeout: Duration) -> BackendResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| AdapterError::ClientBuild { source })?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            sections: config.sections.clone(),
        })
    }

    fn refresh_url(&self, section: &str) -> String {
        format!("{}/library/sections/{section}/refresh", self.base_url)
    }
}

#[async_trait]
impl LibraryRefresher for PlexClient {
    async fn refresh_category(&self, category: Category) -> BackendResult<RefreshReport> {
        let Some(section) = self.sections.get(category) else {
            warn!(%category, "no library section configured for category");
            return Ok(RefreshReport::failed(format!(
                "no library section configured for category {category}"
            )));
        };

        let response = self
            .http
            .get(self.refresh_url(section))
            .query(&[(TOKEN_PARAM, self.token.as_str())])
            .send()
            .await
            .map_err(|source| AdapterError::Transport {
                operation: "library.refresh",
                source,
            })?;

        let status = response.status();
        if status == StatusCode::OK {
            info!(%category, section = %section, "library refresh requested");
            Ok(RefreshReport::succeeded(format!(
                "refreshed library section {section}"
            )))
        } else {
            warn!(%category, section = %section, status = status.as_u16(), "library refresh declined");
            Ok(RefreshReport::failed(format!(
                "unexpected status code: {}",
                status.as_u16()
            )))
        }
    }
}
