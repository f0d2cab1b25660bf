use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use osw_confidence_adapters::{FileBlobStorage, HttpBlobStorage, HttpScoringOracle, MemoryBus};
use osw_confidence_core::ports::{BlobStorage, MessageBus, ScoringOracle};
use osw_confidence_core::ServiceConfig;
use osw_confidence_pipeline::{ConfidencePipeline, ScoringCoordinator};
use osw_confidence_service::simulate::SimulatedOracle;
use osw_confidence_service::{create_router, AppState, JobIntakeService};

/// OpenSidewalks confidence scoring service
#[derive(Parser, Debug)]
#[command(name = "osw-confidence-service")]
#[command(about = "Scores the confidence of OpenSidewalks datasets", long_about = None)]
#[command(version)]
struct Args {
    /// TOML configuration file, applied before environment variables
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "osw_confidence=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = ServiceConfig::with_defaults();
    if let Some(path) = &args.config {
        config = config
            .load_from_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?;
    }
    let config = config.load_from_env();
    config.validate().context("Invalid service configuration")?;
    let config = Arc::new(config);

    tracing::info!(
        port = config.port,
        container = %config.container_name,
        max_concurrent_jobs = config.max_concurrent_jobs,
        job_timeout_secs = config.job_timeout.as_secs(),
        simulate = config.is_simulated(),
        "Starting OSW confidence service"
    );

    let bus = Arc::new(MemoryBus::new());

    let storage: Arc<dyn BlobStorage> = match &config.storage_root {
        Some(root) => {
            tracing::info!(root = %root.display(), "Using local directory storage");
            Arc::new(FileBlobStorage::new(root))
        }
        None => match &config.storage_base_url {
            Some(base_url) => {
                tracing::info!(base_url = %base_url, "Resolving relative blob references");
                Arc::new(HttpBlobStorage::with_base_url(base_url.clone()))
            }
            None => Arc::new(HttpBlobStorage::new()),
        },
    };

    let oracle: Arc<dyn ScoringOracle> = match &config.scoring_url {
        Some(url) => Arc::new(HttpScoringOracle::connect(url.clone()).await),
        None => Arc::new(SimulatedOracle),
    };
    tracing::info!(library_version = %oracle.library_version(), "Scoring oracle ready");

    let pipeline = Arc::new(ConfidencePipeline::new(ScoringCoordinator::new(
        oracle,
        config.credentials.clone(),
        config.sub_region_failures,
    )));

    let intake = JobIntakeService::new(config.clone(), bus.clone(), storage, pipeline);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let intake_handle = tokio::spawn(async move { intake.run(shutdown_rx).await });

    let bus: Arc<dyn MessageBus> = bus;
    let state = Arc::new(AppState::new(&config.app_name, bus, &config.incoming_topic));
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown_tx.send(true).ok();
    intake_handle.await.context("Intake task failed")??;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, shutting down");
        },
    }
}
