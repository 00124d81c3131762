//! Router assembly and the listener loop.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use magnetar_telemetry::Metrics;
use magnetar_torrent_core::DownloadWorkflow;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::downloads::submit_download;
use crate::http::health::{health, metrics};
use crate::http::telemetry::HttpMetricsLayer;
use crate::state::ApiState;

/// Axum router wrapper hosting the Magnetar HTTP API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the router around the submission workflow and metrics registry.
    #[must_use]
    pub fn new(workflow: Arc<dyn DownloadWorkflow>, telemetry: Metrics) -> Self {
        let state = Arc::new(ApiState::new(workflow, telemetry.clone()));
        let router = Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .route("/v1/downloads", post(submit_download))
            .route_layer(HttpMetricsLayer::new(telemetry))
            .with_state(state);
        Self { router }
    }

    /// Underlying router, for embedding or in-process testing.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind `addr` and serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Bind`] when the listener cannot be opened and
    /// [`ApiServerError::Serve`] when the accept loop fails.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> ApiServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        info!(addr = %addr, "api listener bound");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })?;
        info!("api listener stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::DownloadRequest;
    use crate::http::errors::{PROBLEM_BAD_REQUEST, PROBLEM_SERVICE_UNAVAILABLE, ProblemDetails};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header::CONTENT_TYPE};
    use axum::response::Response;
    use magnetar_events::{DownloadStatus, JobId, MESSAGE_STARTED, ProgressEvent};
    use magnetar_torrent_core::{
        BackendError, RequestedCategory, SubmitDownload, SubmitError, SubmitResult,
        TorrentSource,
    };
    use serde_json::json;
    use std::error::Error;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Clone, Copy)]
    enum Outcome {
        Accept,
        BackendDown,
    }

    struct StubWorkflow {
        outcome: Outcome,
        calls: Mutex<Vec<SubmitDownload>>,
    }

    impl StubWorkflow {
        fn new(outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<SubmitDownload> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl DownloadWorkflow for StubWorkflow {
        async fn submit(&self, request: SubmitDownload) -> SubmitResult<ProgressEvent> {
            let category = request.category.resolve()?;
            self.calls.lock().expect("calls lock").push(request);
            match self.outcome {
                Outcome::Accept => Ok(ProgressEvent::started(JobId::generate())),
                Outcome::BackendDown => Err(SubmitError::BackendUnavailable {
                    source: BackendError::Rejected {
                        operation: "torrent.add",
                        message: format!("no room for {category}"),
                    },
                }),
            }
        }
    }

    fn server(workflow: Arc<StubWorkflow>) -> Result<(ApiServer, Metrics), Box<dyn Error>> {
        let metrics = Metrics::new()?;
        Ok((ApiServer::new(workflow, metrics.clone()), metrics))
    }

    fn post_json(body: &serde_json::Value) -> Result<Request<Body>, Box<dyn Error>> {
        Ok(Request::builder()
            .method("POST")
            .uri("/v1/downloads")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body)?))?)
    }

    async fn problem(response: Response) -> Result<ProblemDetails, Box<dyn Error>> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[tokio::test]
    async fn accepted_magnet_returns_created_started_event() -> Result<(), Box<dyn Error>> {
        let workflow = StubWorkflow::new(Outcome::Accept);
        let (server, metrics) = server(workflow.clone())?;

        let response = server
            .router()
            .oneshot(post_json(&json!({
                "category": 1,
                "magnet_link": "magnet:?xt=urn:btih:abc"
            }))?)
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);

        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let event: ProgressEvent = serde_json::from_slice(&bytes)?;
        assert_eq!(event.status, DownloadStatus::InProgress);
        assert_eq!(event.message, MESSAGE_STARTED);

        let calls = workflow.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(calls[0].source, TorrentSource::Magnet { .. }));
        let rendered = metrics.render()?;
        let line = rendered
            .lines()
            .find(|line| line.starts_with("http_requests_total{"))
            .unwrap_or_default();
        assert!(line.contains("route=\"/v1/downloads\""));
        assert!(line.contains("code=\"201\""));
        Ok(())
    }

    #[tokio::test]
    async fn torrent_file_payload_reaches_workflow_decoded() -> Result<(), Box<dyn Error>> {
        let workflow = StubWorkflow::new(Outcome::Accept);
        let (server, _) = server(workflow.clone())?;
        let body = serde_json::to_value(DownloadRequest {
            category: RequestedCategory::Name("series".to_string()),
            magnet_link: None,
            torrent_file: Some("ZDQ6aW5mb2Vl".to_string()),
        })?;

        let response = server.router().oneshot(post_json(&body)?).await?;
        assert_eq!(response.status(), StatusCode::CREATED);
        match &workflow.calls()[0].source {
            TorrentSource::Metainfo { bytes } => assert_eq!(bytes.as_slice(), b"d4:infoe"),
            TorrentSource::Magnet { .. } => panic!("expected metainfo source"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn unknown_category_is_bad_request() -> Result<(), Box<dyn Error>> {
        let workflow = StubWorkflow::new(Outcome::Accept);
        let (server, _) = server(workflow.clone())?;

        let response = server
            .router()
            .oneshot(post_json(&json!({
                "category": 9,
                "magnet_link": "magnet:?xt=urn:btih:abc"
            }))?)
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = problem(response).await?;
        assert_eq!(body.kind, PROBLEM_BAD_REQUEST);
        assert!(workflow.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() -> Result<(), Box<dyn Error>> {
        let (server, _) = server(StubWorkflow::new(Outcome::Accept))?;
        let request = Request::builder()
            .method("POST")
            .uri("/v1/downloads")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{\"category\":"))?;

        let response = server.router().oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn backend_outage_is_service_unavailable() -> Result<(), Box<dyn Error>> {
        let (server, _) = server(StubWorkflow::new(Outcome::BackendDown))?;

        let response = server
            .router()
            .oneshot(post_json(&json!({
                "category": "films",
                "magnet_link": "magnet:?xt=urn:btih:abc"
            }))?)
            .await?;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = problem(response).await?;
        assert_eq!(body.kind, PROBLEM_SERVICE_UNAVAILABLE);
        assert_eq!(body.detail.as_deref(), Some("no room for films"));
        Ok(())
    }

    #[tokio::test]
    async fn health_and_metrics_are_served() -> Result<(), Box<dyn Error>> {
        let (server, metrics) = server(StubWorkflow::new(Outcome::Accept))?;
        metrics.set_active_jobs(2);

        let response = server
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["metrics"]["active_jobs"], 2);

        let response = server
            .router()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        assert!(String::from_utf8(bytes.to_vec())?.contains("active_jobs 2"));
        Ok(())
    }

    #[tokio::test]
    async fn serve_reports_bind_failures() -> Result<(), Box<dyn Error>> {
        let occupied = TcpListener::bind("127.0.0.1:0").await?;
        let addr = occupied.local_addr()?;
        let (server, _) = server(StubWorkflow::new(Outcome::Accept))?;

        let err = server
            .serve(addr, std::future::ready(()))
            .await
            .expect_err("port already bound");
        assert!(matches!(err, ApiServerError::Bind { .. }));
        Ok(())
    }
}
