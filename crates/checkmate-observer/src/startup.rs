//! Observer server startup helper for embedding in the server binary.
//!
//! [`spawn_observer`] binds the listener up front, then runs the server on
//! a background Tokio task so it serves alongside the change poller.

use std::net::SocketAddr;
use std::sync::Arc;

use checkmate_core::ShutdownSignal;
use checkmate_core::config::ObserverConfig;
use tokio::task::JoinHandle;

use crate::server::{self, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the Observer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Spawn the Observer HTTP server on a background Tokio task.
///
/// Returns the bound address (useful with port `0`) and a [`JoinHandle`]
/// that completes once `shutdown` fires and open requests drain.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the listener cannot bind. This is
/// detected before the background task is spawned.
pub async fn spawn_observer(
    config: &ObserverConfig,
    state: Arc<AppState>,
    shutdown: ShutdownSignal,
) -> Result<(SocketAddr, JoinHandle<()>), StartupError> {
    let listener = server::bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("listener has no address: {e}")))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state, shutdown).await {
            tracing::error!(error = %e, "Observer server exited with error");
        }
    });

    tracing::info!(%addr, "Observer server spawned on background task");

    Ok((addr, handle))
}
