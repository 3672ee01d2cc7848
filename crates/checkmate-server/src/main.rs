//! Server binary for Checkmate Live.
//!
//! Wires the race store, change poller, broadcaster, and observer API
//! together and runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `checkmate-config.yaml` (or `CHECKMATE_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Validate configuration; any error stops startup before polling
//! 4. Configure the `PostgreSQL` pool (lazy: an unreachable database shows
//!    up as failed ticks, not a crash)
//! 5. Create the broadcaster and change poller
//! 6. Start the observer API server
//! 7. Run the poller until `Ctrl-C`, then shut everything down

mod error;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use checkmate_core::config::{LogFormat, LoggingConfig};
use checkmate_core::{Broadcaster, ChangePoller, CheckmateConfig, Shutdown};
use checkmate_db::{PgRaceStore, PostgresConfig, PostgresPool};
use checkmate_observer::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ServerError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "checkmate-config.yaml";

/// How long to wait for background tasks after the shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or a subsystem fails to start.
#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // 1. Load configuration.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        config = %config_path.display(),
        config_found = config_path.exists(),
        "checkmate-server starting"
    );

    // 3. Validate before anything starts.
    config.validate()?;
    info!(
        poll_interval_ms = config.poller.interval_ms,
        qualification_threshold = %config.scoring.qualification_threshold,
        subscriber_capacity = config.broadcast.subscriber_capacity,
        "Configuration loaded"
    );

    // 4. Race store.
    let pool = PostgresPool::connect_lazy(&PostgresConfig::from(&config.database))?;
    let store = Arc::new(PgRaceStore::new(pool.clone()));

    // 5. Broadcaster and poller.
    let broadcaster = Arc::new(Broadcaster::new(config.broadcast.subscriber_capacity));
    let poller = ChangePoller::new(
        store,
        config.scoring.clone(),
        Arc::clone(&broadcaster),
        Duration::from_millis(config.poller.interval_ms),
    );

    // 6. Observer API.
    let shutdown = Shutdown::new();
    let app_state = Arc::new(AppState::new(
        Arc::clone(&broadcaster),
        poller.status(),
        config.scoring.clone(),
    ));
    let (addr, observer_handle) =
        checkmate_observer::spawn_observer(&config.observer, app_state, shutdown.signal()).await?;
    info!(%addr, "Observer API server started");

    // 7. Poll until interrupted.
    let poller_handle = tokio::spawn(poller.run(shutdown.signal()));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| ServerError::Signal {
            message: format!("failed to listen for Ctrl-C: {e}"),
        })?;
    info!("Shutdown requested");
    shutdown.trigger();

    if tokio::time::timeout(SHUTDOWN_GRACE, poller_handle).await.is_err() {
        warn!("Change poller did not stop in time");
    }
    if tokio::time::timeout(SHUTDOWN_GRACE, observer_handle).await.is_err() {
        warn!("Observer server did not stop in time");
    }
    pool.close().await;

    info!("checkmate-server stopped");
    Ok(())
}

/// Load configuration from `CHECKMATE_CONFIG` or `checkmate-config.yaml`.
///
/// A missing file is not an error: defaults plus environment overrides
/// are used.
fn load_config() -> Result<(CheckmateConfig, PathBuf), ServerError> {
    let path = std::env::var_os("CHECKMATE_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if path.exists() {
        Ok((CheckmateConfig::from_file(&path)?, path))
    } else {
        let mut config = CheckmateConfig::default();
        config.apply_env_overrides();
        Ok((config, path))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match config.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}
