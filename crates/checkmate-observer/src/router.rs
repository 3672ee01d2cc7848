//! Axum router construction for the Observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/races` -- `WebSocket` snapshot stream
/// - `GET /api/status` -- snapshot and poller status
/// - `GET /api/races/qualified` -- current qualified races
/// - `GET /api/adapters/status` -- adapter statuses
/// - `GET /api/settings` -- scoring configuration
///
/// Any other path answers with a JSON `404` body.
///
/// CORS allows any origin so dashboards can be served from elsewhere.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/races", get(ws::ws_races))
        // REST API
        .route("/api/status", get(handlers::get_status))
        .route("/api/races/qualified", get(handlers::get_qualified_races))
        .route("/api/adapters/status", get(handlers::get_adapter_statuses))
        .route("/api/settings", get(handlers::get_settings))
        .fallback(handlers::not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
