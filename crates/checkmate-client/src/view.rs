//! The subscriber's live view: race board, cursor, and connection state.
//!
//! Every decoded server frame goes through [`LiveView::apply`]. Snapshots
//! older than the last accepted cursor are ignored, the `empty` marker
//! leaves the board as it is, and a snapshot the reconciler rejects is
//! discarded. Losing the connection only changes [`ConnectionStatus`];
//! the board keeps its last good rows.

use checkmate_types::{EventId, ServerMessage, Snapshot};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::ReconcileError;
use crate::reconcile::{RaceBoard, ReconcileReport};

/// Connection state shown alongside the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Opening a connection.
    Connecting,
    /// Connected and receiving frames.
    Live,
    /// Connection lost; rows are from before this instant.
    Disconnected {
        /// When the connection dropped.
        since: DateTime<Utc>,
    },
}

/// What applying one server frame did to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The snapshot was merged into the board.
    Applied {
        /// Cursor of the merged snapshot.
        cursor: EventId,
        /// Per-row counts.
        report: ReconcileReport,
    },
    /// The server has no snapshot yet; the board is unchanged.
    Empty,
    /// The snapshot's cursor is below the last accepted one.
    Stale {
        /// Cursor carried by the ignored snapshot.
        offered: EventId,
        /// Cursor already held.
        current: EventId,
    },
    /// The reconciler rejected the snapshot.
    Rejected(ReconcileError),
    /// The frame could not be decoded.
    Undecodable,
}

/// Local state of one subscriber.
#[derive(Debug)]
pub struct LiveView {
    board: RaceBoard,
    cursor: Option<EventId>,
    status: ConnectionStatus,
    last_applied_at: Option<DateTime<Utc>>,
}

impl Default for LiveView {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveView {
    /// Create an empty view in the [`ConnectionStatus::Connecting`] state.
    pub fn new() -> Self {
        Self {
            board: RaceBoard::new(),
            cursor: None,
            status: ConnectionStatus::Connecting,
            last_applied_at: None,
        }
    }

    /// Decode a text frame and apply it.
    pub fn apply_text(&mut self, text: &str) -> ApplyOutcome {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => self.apply(&message),
            Err(e) => {
                warn!("Discarding undecodable server frame: {e}");
                ApplyOutcome::Undecodable
            }
        }
    }

    /// Apply a decoded server message.
    pub fn apply(&mut self, message: &ServerMessage) -> ApplyOutcome {
        match message {
            ServerMessage::Snapshot(snapshot) | ServerMessage::Update(snapshot) => {
                self.apply_snapshot(snapshot)
            }
            ServerMessage::Empty => ApplyOutcome::Empty,
        }
    }

    fn apply_snapshot(&mut self, snapshot: &Snapshot) -> ApplyOutcome {
        if let Some(current) = self.cursor.filter(|current| snapshot.cursor < *current) {
            debug!(offered = %snapshot.cursor, %current, "Ignoring stale snapshot");
            return ApplyOutcome::Stale {
                offered: snapshot.cursor,
                current,
            };
        }

        match self.board.reconcile(&snapshot.races) {
            Ok(report) => {
                self.cursor = Some(snapshot.cursor);
                self.last_applied_at = Some(Utc::now());
                ApplyOutcome::Applied {
                    cursor: snapshot.cursor,
                    report,
                }
            }
            Err(e) => {
                warn!(cursor = %snapshot.cursor, "Discarding snapshot: {e}");
                ApplyOutcome::Rejected(e)
            }
        }
    }

    /// Mark a connection attempt in progress.
    pub const fn set_connecting(&mut self) {
        self.status = ConnectionStatus::Connecting;
    }

    /// Mark the connection established.
    pub const fn set_live(&mut self) {
        self.status = ConnectionStatus::Live;
    }

    /// Mark the connection lost. Repeated calls keep the first instant.
    pub fn set_disconnected(&mut self, at: DateTime<Utc>) {
        if !matches!(self.status, ConnectionStatus::Disconnected { .. }) {
            self.status = ConnectionStatus::Disconnected { since: at };
        }
    }

    /// The race board.
    pub const fn board(&self) -> &RaceBoard {
        &self.board
    }

    /// Cursor of the last accepted snapshot.
    pub const fn cursor(&self) -> Option<EventId> {
        self.cursor
    }

    /// Current connection state.
    pub const fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// When a snapshot was last merged.
    pub const fn last_applied_at(&self) -> Option<DateTime<Utc>> {
        self.last_applied_at
    }
}
