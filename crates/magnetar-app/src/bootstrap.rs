use std::net::SocketAddr;
use std::sync::Arc;

use magnetar_adapters::{PlexClient, TransmissionClient};
use magnetar_api::ApiServer;
use magnetar_config::AppConfig;
use magnetar_runtime::{JobStore, KeyValueStore, ProgressQueue, RedisStore};
use magnetar_telemetry::{
    DEFAULT_LOG_LEVEL, GlobalContextGuard, LogFormat, LoggingConfig, Metrics, init_logging,
};
use magnetar_torrent_core::{DownloadBackend, DownloadWorkflow, LibraryRefresher};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::orchestrator::{Coordinator, CoordinatorParts, spawn_checker, spawn_recovery};

/// Dependencies required to bootstrap the Magnetar application.
pub(crate) struct BootstrapDependencies {
    logging: LoggingConfig<'static>,
    config: AppConfig,
    store: Arc<dyn KeyValueStore>,
    backend: Arc<dyn DownloadBackend>,
    refresher: Arc<dyn LibraryRefresher>,
    telemetry: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) async fn from_env() -> AppResult<Self> {
        let config = AppConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
        let logging = LoggingConfig {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::from_name(config.log_format.as_deref()),
            ..LoggingConfig::default()
        };
        let call_timeout = config.scheduler.call_timeout;

        let store = RedisStore::connect(
            &config.redis.url,
            config.redis.password.as_deref(),
            call_timeout,
        )
        .await
        .map_err(|err| AppError::store("redis.connect", err))?;
        let backend = TransmissionClient::new(&config.transmission, call_timeout)
            .map_err(|err| AppError::backend("transmission.new", err))?;
        let refresher = PlexClient::new(&config.plex, call_timeout)
            .map_err(|err| AppError::backend("plex.new", err))?;
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;

        Ok(Self {
            logging,
            config,
            store: Arc::new(store),
            backend: Arc::new(backend),
            refresher: Arc::new(refresher),
            telemetry,
        })
    }
}

/// Entry point for the Magnetar boot sequence.
///
/// # Errors
///
/// Returns an error if dependency construction or application startup fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env().await?;
    Box::pin(run_app_with(dependencies)).await
}

/// Boot sequence that relies entirely on injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    init_logging(&dependencies.logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("bootstrap");

    info!("Magnetar application bootstrap starting");
    let shutdown = CancellationToken::new();
    let signals = spawn_signal_listener(shutdown.clone());
    let result = run_services(dependencies, shutdown.clone()).await;
    shutdown.cancel();
    join_task("signal listener", signals).await;
    result
}

/// Start both loops and the API listener; returns once `shutdown` fires and
/// every task, recovery monitors included, has stopped.
pub(crate) async fn run_services(
    dependencies: BootstrapDependencies,
    shutdown: CancellationToken,
) -> AppResult<()> {
    let BootstrapDependencies {
        logging: _,
        config,
        store,
        backend,
        refresher,
        telemetry,
    } = dependencies;

    let coordinator = Arc::new(Coordinator::new(CoordinatorParts {
        backend,
        refresher,
        jobs: JobStore::new(Arc::clone(&store)),
        queue: ProgressQueue::new(store, config.queue_ttl),
        metrics: telemetry.clone(),
        download_dirs: config.transmission.download_dirs.clone(),
        scheduler: config.scheduler,
    }));
    let checker = spawn_checker(Arc::clone(&coordinator), shutdown.clone());
    let recovery = spawn_recovery(Arc::clone(&coordinator), shutdown.clone());
    let monitors = Arc::clone(&coordinator);

    let workflow: Arc<dyn DownloadWorkflow> = coordinator;
    let api = ApiServer::new(workflow, telemetry);
    let addr: SocketAddr = config.server.socket_addr();
    info!(addr = %addr, "Launching API listener");
    let server_shutdown = shutdown.clone();
    let serve_result = api
        .serve(addr, async move { server_shutdown.cancelled().await })
        .await;

    // A listener failure still has to stop the loops.
    shutdown.cancel();
    join_task("progress checker", checker).await;
    join_task("recovery sweep", recovery).await;
    monitors.drain_monitors().await;

    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("API server shutdown complete");
    Ok(())
}

async fn join_task(name: &'static str, handle: JoinHandle<()>) {
    if let Err(err) = handle.await {
        warn!(error = %err, task = name, "background task join failed");
    }
}

fn spawn_signal_listener(shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = shutdown.cancelled() => {}
            () = shutdown_signal() => {
                info!("shutdown signal received");
                shutdown.cancel();
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
