use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod draws;
mod lotto;
#[cfg(test)]
mod testing;

use config::Config;
use db::Database;
use draws::{DrawSync, Fleet};
use lotto::LottoClient;

#[tokio::main]
async fn main() -> Result<()> {
    config::load_env_file(Path::new(".env"))?;
    let config = Config::parse();
    init_tracing(&config);
    config.validate()?;
    let api_key = config.api_key().context("LOTTO_API_KEY is required")?;

    info!("Starting lotto-watch ({})", config.environment);

    // Open database
    let db = Arc::new(Database::open(&config.database_path)?);
    info!("Database opened: {}", config.database_path);

    let client = LottoClient::new(
        api_key,
        Some(config.lotto_api_url.as_str()),
        config.http_timeout(),
    )?;

    let sync = Arc::new(DrawSync::new(Arc::new(client), db.clone()));
    let fleet = Fleet::new(sync, config.backoff_policy());

    let watchers = match fleet.bootstrap().await {
        Ok(w) => w,
        Err(e) => {
            error!("Startup failed: {}", e);
            return Err(e.into());
        }
    };

    let running = Fleet::launch(watchers, CancellationToken::new());
    info!("Watching {} game(s)", running.watcher_count());

    shutdown_signal().await;
    info!("Shutting down gracefully...");

    let summary = running.shutdown().await;
    info!(
        "Shutdown complete: {} settled, {} cancelled, {} failed",
        summary.settled, summary.cancelled, summary.failed
    );

    // Last handle to the connection; dropping it closes the database
    drop(fleet);
    drop(db);
    info!("Database closed");
    Ok(())
}

/// Human-readable logs in development, JSON everywhere else. RUST_LOG wins
/// over the per-environment default level.
fn init_tracing(config: &Config) {
    let default_level = if config.is_development() { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    if config.is_development() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
