//! Room-code hold'em server.
//!
//! Thin HTTP/WebSocket surface over the `card_room` coordinator: all
//! rules, locking, and persistence live in the library. This binary wires
//! the store, the coordinator, the background tasks, and the axum router
//! together.

mod api;
mod config;
mod logging;
mod metrics;

use std::sync::Arc;

use anyhow::Error;
use pico_args::Arguments;

use card_room::{
    ConnectionRegistry, GameCoordinator, GameStore, PostgresStore, StaleGameSweeper, TimerDriver,
};

use config::ServerConfig;

const HELP: &str = "\
Run a room-code hold'em server

USAGE:
  cr_server [OPTIONS]

OPTIONS:
  --bind     IP:PORT   Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url   URL       Database connection string  [default: env DATABASE_URL]

FLAGS:
  -h, --help           Print help information

ENVIRONMENT:
  SERVER_BIND          Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL         PostgreSQL connection string
  METRICS_BIND         Prometheus exporter bind address
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Note: dotenvy does NOT override existing environment variables.
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    logging::init();

    let config = ServerConfig::from_env(
        pargs.opt_value_from_str("--bind")?,
        pargs.opt_value_from_str("--db-url")?,
    )
    .map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("configuration validation failed: {e}"))?;

    if let Err(e) = metrics::init_metrics(config.metrics_bind) {
        tracing::warn!("failed to initialize metrics exporter: {e}");
    } else {
        tracing::info!(
            "metrics available at http://{}/metrics",
            config.metrics_bind
        );
    }

    tracing::info!("connecting to database");
    let store: Arc<dyn GameStore> = Arc::new(
        PostgresStore::connect(&config.database_url, config.db_max_connections)
            .await
            .map_err(|e| anyhow::anyhow!("failed to connect to database: {e}"))?,
    );
    tracing::info!("database connected");

    let registry = Arc::new(ConnectionRegistry::new());
    let coordinator = Arc::new(GameCoordinator::new(store, registry.clone()));

    // Background tasks: turn/auto-deal timers, stale-game sweeping, and
    // connection heartbeats. All die with the process.
    let timer_task = tokio::spawn(TimerDriver::new(coordinator.clone()).run());
    let sweeper_task = tokio::spawn(StaleGameSweeper::new(coordinator.clone()).run());
    let heartbeat_task = tokio::spawn(registry.clone().run_heartbeat());

    let state = api::AppState {
        coordinator,
        registry,
    };
    let app = api::create_router(state);

    tracing::info!("listening on http://{}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {e}", config.bind))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))?;

    tracing::info!("shutting down");
    timer_task.abort();
    sweeper_task.abort();
    heartbeat_task.abort();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
}
