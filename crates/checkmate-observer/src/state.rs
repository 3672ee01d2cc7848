//! Shared application state for the Observer API server.

use std::sync::Arc;

use checkmate_core::{Broadcaster, PollerStatus, ScoringConfig};
use tokio::sync::watch;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Snapshot fan-out fed by the change poller.
    pub broadcaster: Arc<Broadcaster>,
    /// Latest poller health.
    pub poller_status: watch::Receiver<PollerStatus>,
    /// Scoring configuration the poller runs with.
    pub scoring: ScoringConfig,
}

impl AppState {
    /// Bundle the pieces the handlers read from.
    pub const fn new(
        broadcaster: Arc<Broadcaster>,
        poller_status: watch::Receiver<PollerStatus>,
        scoring: ScoringConfig,
    ) -> Self {
        Self {
            broadcaster,
            poller_status,
            scoring,
        }
    }

    /// Copy of the latest poller status.
    pub fn poller_status(&self) -> PollerStatus {
        self.poller_status.borrow().clone()
    }
}
