//! `checkmate-watch`: follow the live qualified-race board from a terminal.
//!
//! Connects to the observer stream, keeps a local board in sync, and logs
//! the board whenever it or the connection state changes. Runs until
//! `Ctrl-C`.
//!
//! Configuration comes from `CHECKMATE_WATCH_CONFIG` or
//! `checkmate-watch.yaml`; without a file the defaults are used.
//! `CHECKMATE_URL` overrides the feed URL either way.

use std::path::PathBuf;

use anyhow::Context;
use checkmate_client::{ClientConfig, ConnectionStatus, LiveFeed, LiveView};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "checkmate-watch.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    config.validate().context("invalid client configuration")?;
    info!(url = %config.url, "checkmate-watch starting");

    let feed = LiveFeed::new(&config);
    let view = feed.view();
    let mut changes = feed.changes();
    let feed_handle = tokio::spawn(feed.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
        }
    }));

    while changes.changed().await.is_ok() {
        log_board(&view.read());
    }

    feed_handle.await.context("feed task panicked")?;
    info!("checkmate-watch stopped");
    Ok(())
}

fn load_config() -> anyhow::Result<ClientConfig> {
    let path = std::env::var_os("CHECKMATE_WATCH_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if path.exists() {
        ClientConfig::from_file(&path)
            .with_context(|| format!("failed to load {}", path.display()))
    } else {
        let mut config = ClientConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

fn log_board(view: &LiveView) {
    match view.status() {
        ConnectionStatus::Connecting => info!("Connecting"),
        ConnectionStatus::Disconnected { since } => {
            warn!(%since, rows = view.board().len(), "Disconnected; showing last known board");
        }
        ConnectionStatus::Live => {
            let cursor = view
                .cursor()
                .map_or_else(|| String::from("none"), |c| c.to_string());
            info!(%cursor, qualified = view.board().len(), "Board");
            for row in view.board().rows() {
                let race = row.read();
                info!(
                    race = %race.id,
                    venue = %race.venue,
                    race_number = race.race_number,
                    post_time = %race.post_time,
                    score = %race.score,
                    "  qualified"
                );
            }
        }
    }
}
