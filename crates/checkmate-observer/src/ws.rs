//! `WebSocket` handler for the live qualified-race stream.
//!
//! Clients connect to `GET /ws/races`. On connect they receive one
//! `snapshot` message with the last known snapshot, or an `empty` message
//! when the poller has not published yet. Every later publish arrives as
//! an `update` message with the same shape.
//!
//! A client may send `{"type":"refresh"}` to have the current snapshot
//! re-sent; the store is not queried. Any other client frame is ignored.
//!
//! Cursors sent on one connection never go backwards: an update older
//! than something already sent (possible right after a refresh) is
//! skipped.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use checkmate_types::{
    ClientMessage, EventId, Snapshot, SnapshotKind, encode_empty, encode_snapshot,
};
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming snapshots.
///
/// # Route
///
/// `GET /ws/races`
pub async fn ws_races(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Tracks the highest cursor sent on one connection.
struct Outbox {
    socket: WebSocket,
    last_sent: Option<EventId>,
}

impl Outbox {
    /// Send a snapshot frame unless it is older than one already sent.
    ///
    /// Returns `false` when the client is gone.
    async fn send_snapshot(&mut self, kind: SnapshotKind, snapshot: &Snapshot) -> bool {
        if self.last_sent.is_some_and(|last| snapshot.cursor < last) {
            return true;
        }
        match encode_snapshot(kind, snapshot) {
            Ok(json) => {
                if !self.send_text(json).await {
                    return false;
                }
                self.last_sent = Some(snapshot.cursor);
                true
            }
            Err(e) => {
                warn!(cursor = %snapshot.cursor, "Failed to serialize snapshot: {e}");
                true
            }
        }
    }

    async fn send_empty(&mut self) -> bool {
        match encode_empty() {
            Ok(json) => self.send_text(json).await,
            Err(e) => {
                warn!("Failed to serialize empty marker: {e}");
                true
            }
        }
    }

    async fn send_current(&mut self, kind: SnapshotKind, current: Option<Arc<Snapshot>>) -> bool {
        match current {
            Some(snapshot) => self.send_snapshot(kind, &snapshot).await,
            None => self.send_empty().await,
        }
    }

    async fn send_text(&mut self, json: String) -> bool {
        self.socket.send(Message::Text(json.into())).await.is_ok()
    }
}

/// Handle the `WebSocket` lifecycle: register with the broadcaster, send
/// the initial frame, then forward every published snapshot.
async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    let mut subscription = state.broadcaster.subscribe().await;
    let subscriber_id = subscription.id();
    debug!(%subscriber_id, "WebSocket client connected");

    let mut outbox = Outbox {
        socket,
        last_sent: None,
    };

    if outbox
        .send_current(SnapshotKind::Snapshot, subscription.initial())
        .await
    {
        loop {
            tokio::select! {
                result = subscription.recv() => {
                    let Ok(snapshot) = result else {
                        debug!(%subscriber_id, "Broadcaster closed, shutting down WebSocket");
                        break;
                    };
                    if !outbox.send_snapshot(SnapshotKind::Update, &snapshot).await {
                        debug!(%subscriber_id, "WebSocket client disconnected (send failed)");
                        break;
                    }
                }
                msg = outbox.socket.recv() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => {
                            debug!(%subscriber_id, "WebSocket client disconnected");
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if outbox.socket.send(Message::Pong(data)).await.is_err() {
                                debug!(%subscriber_id, "WebSocket client disconnected (pong failed)");
                                break;
                            }
                        }
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(ClientMessage::Refresh) = serde_json::from_str(text.as_str()) {
                                let current = state.broadcaster.current().await;
                                if !outbox.send_current(SnapshotKind::Snapshot, current).await {
                                    break;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            debug!(%subscriber_id, "WebSocket error: {e}");
                            break;
                        }
                        _ => {
                            // Binary and pong frames carry nothing for us.
                        }
                    }
                }
            }
        }
    }

    state.broadcaster.unsubscribe(subscription);
}
