//! Wire messages exchanged between the observer server and subscribers.
//!
//! All messages are JSON text frames tagged by a `type` field:
//!
//! | Direction | `type` | Payload |
//! |-----------|--------|---------|
//! | server -> client | `snapshot` | full [`Snapshot`], sent once on connect and on `refresh` |
//! | server -> client | `update` | full [`Snapshot`], sent on every detected change |
//! | server -> client | `empty` | none; no snapshot has been produced yet |
//! | client -> server | `refresh` | none; asks for the last known snapshot again |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::EventId;
use crate::structs::ScoredRace;

/// The complete current set of qualified races, tagged with the event
/// cursor it was computed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Snapshot {
    /// Highest change-log id reflected in this snapshot.
    pub cursor: EventId,
    /// When the poller produced the snapshot.
    pub generated_at: DateTime<Utc>,
    /// Qualified races, best score first.
    pub races: Vec<ScoredRace>,
}

/// Whether a snapshot frame is the initial/refresh copy or a change push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    /// Sent on connect or in answer to a refresh request.
    Snapshot,
    /// Sent when the poller detects a change.
    Update,
}

/// A message pushed from the server to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Last known snapshot (on connect or refresh).
    Snapshot(Snapshot),
    /// A newly published snapshot.
    Update(Snapshot),
    /// No snapshot exists yet.
    Empty,
}

impl ServerMessage {
    /// Borrow the carried snapshot, if any.
    pub const fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Snapshot(snapshot) | Self::Update(snapshot) => Some(snapshot),
            Self::Empty => None,
        }
    }
}

/// A message sent from a subscriber to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Re-send the last known snapshot.
    Refresh,
}

#[derive(Serialize)]
struct SnapshotFrame<'a> {
    #[serde(rename = "type")]
    kind: SnapshotKind,
    #[serde(flatten)]
    snapshot: &'a Snapshot,
}

/// Encode a snapshot frame without cloning the snapshot.
///
/// The output decodes as [`ServerMessage::Snapshot`] or
/// [`ServerMessage::Update`] depending on `kind`.
///
/// # Errors
///
/// Returns the serializer error if the snapshot cannot be encoded.
pub fn encode_snapshot(
    kind: SnapshotKind,
    snapshot: &Snapshot,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&SnapshotFrame { kind, snapshot })
}

/// Encode the empty-snapshot marker.
///
/// # Errors
///
/// Returns the serializer error if encoding fails.
pub fn encode_empty() -> Result<String, serde_json::Error> {
    serde_json::to_string(&ServerMessage::Empty)
}
