use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carddex_core::ingest::{CatalogMigrator, HttpRemoteCatalog, MigrationState};
use carddex_core::{
    load_config_or_default, validate_config, CardStore, SearchEngine, SqliteCardStore,
};

use carddex_server::api::create_router;
use carddex_server::state::AppState;

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
    let config_path = std::env::var("CARDDEX_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Store path: {:?}", config.store.path);
    info!("Remote catalog: {}", config.remote.base_url);

    // Config hash for the status endpoint
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = config_hash[..16].to_string();

    // Card store
    let store: Arc<dyn CardStore> = Arc::new(
        SqliteCardStore::open(&config.store.path).context("Failed to open card store")?,
    );
    info!("Card store initialized");

    // Query engine
    let engine = Arc::new(SearchEngine::new(Arc::clone(&store), &config.search));

    // Migration pipeline
    let remote = Arc::new(
        HttpRemoteCatalog::new(&config.remote).context("Failed to create remote catalog client")?,
    );
    let migrator = CatalogMigrator::new(
        Arc::clone(&store),
        remote,
        config.ingest.clone(),
        config.remote.page_size,
        Arc::new(MigrationState::new()),
    );
    info!("Migration pipeline initialized");

    // Create app state and router
    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(
        config,
        config_hash_short,
        store,
        engine,
        migrator,
    ));
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
