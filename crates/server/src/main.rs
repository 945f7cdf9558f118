use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dugout_core::{
    load_config, validate_config, FormatMaintenance, FormatMaintenanceOps, ImportQueue,
    ImportWorker, MediaConverter, MediaStore, S3RemoteStore, ShellConverter, SqliteMediaStore,
    TaskRestarter, TempFileCollector, UnitProcessor,
};

use dugout_server::api::create_router;
use dugout_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("DUGOUT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully (dugout {})", VERSION);
    info!("Database path: {:?}", config.database.path);
    info!("Remote bucket: {}", config.remote_store.bucket);

    // Log a config fingerprint so deployments are distinguishable without
    // leaking secrets.
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("Config hash: {}", &config_hash[..16]);

    // Create the media store
    let store: Arc<dyn MediaStore> = Arc::new(
        SqliteMediaStore::new(&config.database.path).context("Failed to create media store")?,
    );
    info!("Media store initialized");

    // Create the import queue
    let queue = Arc::new(ImportQueue::new());

    // Create the converter and check its tools are reachable
    let converter = Arc::new(ShellConverter::new(config.converter.clone()));
    if let Err(e) = converter.validate().await {
        warn!("Converter validation failed (imports will error): {}", e);
    }

    // Create the remote store client
    let remote = Arc::new(S3RemoteStore::new(config.remote_store.clone()).await);
    info!("Remote store client initialized");

    // Import worker
    let processor = Arc::new(UnitProcessor::new(
        Arc::clone(&converter),
        Arc::clone(&remote),
    ));
    let worker = ImportWorker::new(
        config.worker.clone(),
        Arc::clone(&queue),
        Arc::clone(&store),
        processor,
    );
    worker.start();

    // Restarter: recovers tasks abandoned by a process restart
    let restarter = TaskRestarter::new(
        config.worker.clone(),
        Arc::clone(&queue),
        Arc::clone(&store),
    );
    restarter.start();

    // Format maintenance sweeps
    let format_maintenance = Arc::new(FormatMaintenance::new(
        config.maintenance.clone(),
        Arc::clone(&store),
        Arc::clone(&remote),
        Arc::clone(&converter),
        Arc::clone(&queue),
    ));
    format_maintenance.start();

    // Temp-file collector
    let temp_collector = Arc::new(TempFileCollector::new(
        config.maintenance.clone(),
        Arc::clone(&store),
    ));
    temp_collector.start();

    // Build the HTTP surface
    let app_state = Arc::new(AppState::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        Arc::clone(&format_maintenance) as Arc<dyn FormatMaintenanceOps>,
        config.maintenance.scratch_dir.clone(),
    ));
    let router = create_router(app_state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop background loops; in-flight work finishes its current call.
    info!("Shutting down background services");
    worker.stop();
    restarter.stop();
    format_maintenance.stop();
    temp_collector.stop();

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
