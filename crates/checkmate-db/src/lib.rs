//! `PostgreSQL` race store for Checkmate Live.
//!
//! Ingestion adapters (external) write races, runners, and adapter statuses.
//! Every write to `races` or `runners` appends a row to `change_events`
//! through a statement-level trigger, so the change poller only ever needs
//! "greater than cursor" queries against that table.
//!
//! ```text
//! ingestion --> races / runners --trigger--> change_events
//!                                               |
//!            PgRaceStore (read-only) <----------+
//!                 |
//!            ChangePoller
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`race_store`] -- [`RaceStore`](checkmate_core::RaceStore) implementation
//! - [`error`] -- Shared error types

pub mod error;
pub mod postgres;
pub mod race_store;

pub use error::DbError;
pub use postgres::{PostgresConfig, PostgresPool};
pub use race_store::{PgRaceStore, decode_runner_odds};
