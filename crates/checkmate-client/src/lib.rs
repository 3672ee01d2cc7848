//! Subscriber side of Checkmate Live.
//!
//! Connects to the observer's `/ws/races` stream and keeps a local board
//! of qualified races in sync with every snapshot it receives. Rows are
//! shared records updated in place, so a race that stays qualified keeps
//! the same identity across snapshots.
//!
//! # Modules
//!
//! - [`config`] -- Feed URL and reconnection settings
//! - [`reconcile`] -- Snapshot-to-board merge keyed by race id
//! - [`view`] -- Live view: board, cursor, and connection status
//! - [`connection`] -- Reconnecting `WebSocket` feed
//! - [`error`] -- Client and reconciliation errors

pub mod config;
pub mod connection;
pub mod error;
pub mod reconcile;
pub mod view;

pub use config::{ClientConfig, ReconnectionConfig};
pub use connection::{Backoff, LiveFeed};
pub use error::{ClientError, ReconcileError};
pub use reconcile::{RaceBoard, ReconcileReport, SharedRace};
pub use view::{ApplyOutcome, ConnectionStatus, LiveView};
