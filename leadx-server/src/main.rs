//! Leadx Server
//!
//! Runs the lead auction engine behind an HTTP API: intake and claims come in
//! through the signed service API, invitations go out through the transport
//! adapter, and terminal outcomes are reported to the CRM webhook.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use leadx_core::config::ConfigStore;
use leadx_core::events::engine_channels;
use leadx_core::processors::{
    AuctionCoordinator, ExpirySweeper, NotificationFanout, OutcomeReporter,
};
use leadx_core::store::{AuctionStore, MemoryStore, PgStore};
use leadx_core::transport::HttpTransport;
use leadx_core::utils::{Clock, SystemClock};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Leadx - lead auction engine for real-estate intermediaries
#[derive(Parser, Debug)]
#[command(name = "leadx-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./leadx-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Keep all state in memory instead of PostgreSQL (lost on exit)
    #[arg(long, default_value = "false")]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting leadx-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let shared_config = loaded_config.shared();

    // Pick the store
    let (store, db_pool): (Arc<dyn AuctionStore>, Option<sqlx::PgPool>) = if args.in_memory {
        tracing::warn!("Running with the in-memory store; state is lost on exit");
        (Arc::new(MemoryStore::new()), None)
    } else {
        let database_url = get_database_url().map_err(|e| {
            tracing::error!("DATABASE_URL environment variable not set");
            e
        })?;

        tracing::info!("Connecting to database...");
        let db_pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to database: {}", e);
                e
            })?;
        tracing::info!("Database connection established");

        if args.migrate {
            tracing::info!("Running database migrations...");
            sqlx::migrate!("../migrations")
                .run(&db_pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to run migrations: {}", e);
                    e
                })?;
            tracing::info!("Migrations completed successfully");
        }

        (Arc::new(PgStore::new(db_pool.clone())), Some(db_pool))
    };

    // Wire the engine
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine_config = ConfigStore::new(loaded_config.engine);
    let (senders, receivers) = engine_channels();
    let coordinator = Arc::new(AuctionCoordinator::new(
        Arc::clone(&store),
        Arc::clone(&clock),
        engine_config.clone(),
        senders,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let fanout = NotificationFanout::new(
        Arc::clone(&store),
        Arc::new(HttpTransport::new(loaded_config.transport)),
        coordinator.audit().clone(),
        engine_config.clone(),
    );
    let reporter = OutcomeReporter::new(loaded_config.outcome, Arc::clone(&clock));
    let sweeper = ExpirySweeper::new(Arc::clone(&coordinator), Arc::clone(&clock));

    let processors = [
        tokio::spawn(fanout.run(receivers.broadcast_requested, shutdown_rx.clone())),
        tokio::spawn(reporter.run(receivers.auction_settled, shutdown_rx.clone())),
        tokio::spawn(sweeper.run(shutdown_rx)),
    ];

    // Create application state
    let state = AppState::new(coordinator, shared_config);

    // Spawn config reload handler (listens for SIGHUP)
    let shutdown_notify =
        spawn_config_reload_handler(state.clone(), config_loader, engine_config);

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Stop the processors and wait for in-flight work
    shutdown_notify.notify_one();
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("All processors already stopped");
    }
    for handle in processors {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Processor task failed");
        }
    }

    // Close database connections gracefully
    if let Some(db_pool) = db_pool {
        tracing::info!("Closing database connections...");
        db_pool.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
