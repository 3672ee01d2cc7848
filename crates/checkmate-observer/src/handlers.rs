//! REST API endpoint handlers for the Observer server.
//!
//! All handlers read from the broadcaster and the poller status channel
//! via the shared [`AppState`]. None of them query the store.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/status` | Snapshot cursor, subscriber count, poller health |
//! | `GET` | `/api/races/qualified` | Current snapshot (same shape as the `WebSocket` frame) |
//! | `GET` | `/api/adapters/status` | Adapter statuses from the last refresh |
//! | `GET` | `/api/settings` | Active scoring configuration |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{Uri, header};
use axum::response::{Html, IntoResponse};
use checkmate_core::{PollerStatus, ScoringConfig};
use checkmate_types::{AdapterStatus, EventId, SnapshotKind, encode_empty, encode_snapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ObserverError;
use crate::state::AppState;

/// Body of `GET /api/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Cursor of the current snapshot, `None` before the first publish.
    pub cursor: Option<EventId>,
    /// When the current snapshot was generated.
    pub generated_at: Option<DateTime<Utc>>,
    /// Races in the current snapshot.
    pub qualified: usize,
    /// Connected subscribers.
    pub subscribers: usize,
    /// Change poller health.
    pub poller: PollerStatus,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing live status and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let current = state.broadcaster.current().await;
    let cursor = current
        .as_ref()
        .map_or_else(|| String::from("none"), |s| s.cursor.to_string());
    let qualified = current.as_ref().map_or(0, |s| s.races.len());
    let subscribers = state.broadcaster.subscriber_count();
    let poller = state.poller_status();
    let phase = format!("{:?}", poller.phase);
    let failures = poller.consecutive_failures;
    let health = if failures == 0 { "HEALTHY" } else { "DEGRADED" };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Checkmate Live</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        li::before {{ content: "GET "; color: #7ee787; font-weight: bold; }}
        .status {{ color: #3fb950; font-weight: bold; }}
        hr {{ border: none; border-top: 1px solid #30363d; margin: 1.5rem 0; }}
    </style>
</head>
<body>
    <h1>Checkmate Live</h1>
    <p class="subtitle">Qualified race stream</p>

    <p>Poller: <span class="status">{health}</span></p>

    <div>
        <div class="metric">
            <div class="label">Cursor</div>
            <div class="value">{cursor}</div>
        </div>
        <div class="metric">
            <div class="label">Qualified</div>
            <div class="value">{qualified}</div>
        </div>
        <div class="metric">
            <div class="label">Subscribers</div>
            <div class="value">{subscribers}</div>
        </div>
        <div class="metric">
            <div class="label">Phase</div>
            <div class="value">{phase}</div>
        </div>
        <div class="metric">
            <div class="label">Failures</div>
            <div class="value">{failures}</div>
        </div>
    </div>

    <hr>

    <h2>API Endpoints</h2>
    <ul>
        <li><a href="/api/status">/api/status</a> -- Snapshot and poller status</li>
        <li><a href="/api/races/qualified">/api/races/qualified</a> -- Current qualified races</li>
        <li><a href="/api/adapters/status">/api/adapters/status</a> -- Adapter statuses</li>
        <li><a href="/api/settings">/api/settings</a> -- Scoring configuration</li>
    </ul>

    <h2>WebSocket</h2>
    <ul>
        <li style="list-style:none;"><code>ws://host:port/ws/races</code> -- Live snapshot stream</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Return the current snapshot cursor, subscriber count, and poller health.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let current = state.broadcaster.current().await;
    Json(StatusResponse {
        cursor: current.as_ref().map(|s| s.cursor),
        generated_at: current.as_ref().map(|s| s.generated_at),
        qualified: current.as_ref().map_or(0, |s| s.races.len()),
        subscribers: state.broadcaster.subscriber_count(),
        poller: state.poller_status(),
    })
}

// ---------------------------------------------------------------------------
// GET /api/races/qualified
// ---------------------------------------------------------------------------

/// Return the current snapshot as a `snapshot` message, or the `empty`
/// marker when none has been published.
pub async fn get_qualified_races(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let body = match state.broadcaster.current().await {
        Some(snapshot) => encode_snapshot(SnapshotKind::Snapshot, &snapshot)?,
        None => encode_empty()?,
    };
    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

// ---------------------------------------------------------------------------
// GET /api/adapters/status
// ---------------------------------------------------------------------------

/// Return adapter statuses observed on the last refresh.
pub async fn get_adapter_statuses(State(state): State<Arc<AppState>>) -> Json<Vec<AdapterStatus>> {
    Json(state.broadcaster.adapter_statuses().await)
}

// ---------------------------------------------------------------------------
// GET /api/settings
// ---------------------------------------------------------------------------

/// Return the scoring configuration the poller is running with.
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<ScoringConfig> {
    Json(state.scoring.clone())
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// Answer unknown paths with the JSON error body.
pub async fn not_found(uri: Uri) -> ObserverError {
    ObserverError::NotFound(format!("no route for {}", uri.path()))
}
