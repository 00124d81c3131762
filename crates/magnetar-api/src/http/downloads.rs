//! `POST /v1/downloads`: hand a magnet link or torrent file to the workflow.

use std::sync::Arc;

use axum::{Json, extract::State, extract::rejection::JsonRejection, http::StatusCode};
use base64::{Engine as _, engine::general_purpose};
use magnetar_events::ProgressEvent;
use magnetar_torrent_core::{
    BackendError, RequestedCategory, SubmitDownload, SubmitError, TorrentSource,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Body accepted by the submit endpoint.
///
/// Exactly one of `magnet_link` and `torrent_file` must be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Category code (`1..=5`) or label.
    pub category: RequestedCategory,
    /// Magnet URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnet_link: Option<String>,
    /// Base64 encoded `.torrent` file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torrent_file: Option<String>,
}

impl DownloadRequest {
    pub(crate) fn into_submission(self) -> Result<SubmitDownload, ApiError> {
        let source = match (self.magnet_link, self.torrent_file) {
            (Some(magnet), None) => {
                let magnet = magnet.trim();
                if magnet.is_empty() {
                    return Err(ApiError::bad_request("magnet_link must not be empty"));
                }
                TorrentSource::magnet(magnet)
            }
            (None, Some(encoded)) => {
                let bytes = general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|_| ApiError::bad_request("torrent_file is not valid base64"))?;
                if bytes.is_empty() {
                    return Err(ApiError::bad_request("torrent_file must not be empty"));
                }
                TorrentSource::metainfo(bytes)
            }
            (Some(_), Some(_)) => {
                return Err(ApiError::bad_request(
                    "provide either magnet_link or torrent_file, not both",
                ));
            }
            (None, None) => {
                return Err(ApiError::bad_request(
                    "one of magnet_link or torrent_file is required",
                ));
            }
        };
        Ok(SubmitDownload {
            category: self.category,
            source,
        })
    }
}

pub(crate) async fn submit_download(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProgressEvent>), ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection, "rejected malformed download request");
        ApiError::bad_request(rejection.body_text())
    })?;
    let submission = request.into_submission()?;

    match state.workflow.submit(submission).await {
        Ok(event) => {
            info!(job_id = %event.job_id, "download accepted");
            Ok((StatusCode::CREATED, Json(event)))
        }
        Err(err) => Err(map_submit_error(&err)),
    }
}

fn map_submit_error(err: &SubmitError) -> ApiError {
    match err {
        SubmitError::InvalidCategory(invalid) => ApiError::bad_request(format!(
            "unrecognized download category: {}",
            invalid.value
        )),
        SubmitError::BackendUnavailable { source } => {
            warn!(error = %source, "download backend unavailable");
            let detail = match source {
                BackendError::Rejected { message, .. } => message.clone(),
                other => other.to_string(),
            };
            ApiError::service_unavailable(detail)
        }
        SubmitError::Store { operation, source } => {
            error!(error = %source, operation, "failed to record download job");
            ApiError::internal("failed to record download job")
        }
    }
}
