//! bfly-engine - Observation Classification & Aggregation service
//!
//! Classifies submitted butterfly images, folds accepted observations into
//! research aggregates and the contributor ledger, and serves both over
//! HTTP + SSE.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bfly_common::config::{
    database_path_in, load_toml_config, resolve_config_path, resolve_data_folder,
};
use bfly_common::events::EventBus;
use bfly_common::SpeciesCatalog;
use bfly_engine::classifier::build_classifier;
use bfly_engine::db::SqliteJournal;
use bfly_engine::journal::{MemoryJournal, ObservationJournal};
use bfly_engine::{build_router, AppState, ObservationEngine};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for bfly-engine
#[derive(Parser, Debug)]
#[command(name = "bfly-engine")]
#[command(about = "Butterfly observation classification and aggregation engine")]
#[command(version)]
struct Args {
    /// TOML config file (falls back to BFLY_CONFIG, then the platform default)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "BFLY_PORT")]
    port: Option<u16>,

    /// Data folder (falls back to BFLY_DATA_FOLDER, then config)
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// Journal database file (overrides the data folder default)
    #[arg(long, env = "BFLY_DATABASE")]
    database: Option<PathBuf>,

    /// Species catalog TOML file (built-in catalog when unset)
    #[arg(long, env = "BFLY_CATALOG")]
    catalog: Option<PathBuf>,

    /// Keep the journal in memory; nothing survives a restart
    #[arg(long)]
    ephemeral: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let config = load_toml_config(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting bfly-engine v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    // Config was loaded before the subscriber existed, so report it here
    if config_path.exists() {
        info!("Config: {}", config_path.display());
    } else {
        warn!("Config file {} not found, using defaults", config_path.display());
    }

    let catalog_path = args.catalog.clone().or_else(|| config.catalog_path.clone());
    let catalog = match catalog_path {
        Some(path) => SpeciesCatalog::load(&path)
            .with_context(|| format!("Failed to load species catalog {}", path.display()))?,
        None => SpeciesCatalog::builtin(),
    };
    let catalog = Arc::new(catalog);
    info!("Species catalog: {} entries", catalog.len());

    let backend =
        build_classifier(&config.classifier, &catalog).context("Invalid classifier settings")?;
    info!(
        "Classifier: {} (timeout {:?})",
        backend.name(),
        config.engine.classify_timeout()
    );

    let journal: Arc<dyn ObservationJournal> = if args.ephemeral {
        warn!("Ephemeral mode: observations are not persisted");
        Arc::new(MemoryJournal::new())
    } else {
        let data_folder =
            resolve_data_folder(args.data_folder.as_deref(), config.data_folder.as_deref());
        let db_path = args
            .database
            .clone()
            .or_else(|| config.database_path.clone())
            .unwrap_or_else(|| database_path_in(&data_folder));
        info!("Database: {}", db_path.display());

        let pool = match bfly_common::db::init_database(&db_path).await {
            Ok(pool) => pool,
            Err(e) => {
                error!("Failed to open database: {}", e);
                return Err(e.into());
            }
        };
        let journal = SqliteJournal::new(pool);
        info!("Journal: {} observations on disk", journal.count().await?);
        Arc::new(journal)
    };

    let event_bus = EventBus::new(config.engine.event_capacity);
    info!("Event bus capacity: {}", event_bus.capacity());
    let engine = Arc::new(
        ObservationEngine::new(Arc::clone(&catalog), backend, &config.engine, event_bus)
            .with_journal(journal),
    );

    let stats = engine
        .replay()
        .await
        .context("Failed to replay observation journal")?;
    info!("✓ Restored {} observations from journal", stats.applied);

    let shutdown = CancellationToken::new();
    let app = build_router(AppState::new(Arc::clone(&engine), shutdown.clone()));

    let port = args.port.unwrap_or(config.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM and cancels the shared shutdown token
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }

    shutdown.cancel();
}
