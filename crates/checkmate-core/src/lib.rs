//! Live synchronization and scoring pipeline for Checkmate Live.
//!
//! ```text
//! store mutation --> change log (append-only, numeric ids)
//!                         |
//!                  ChangePoller (fixed interval, private cursor)
//!                         |  candidate races
//!                  scoring::score (pure, per race)
//!                         |  qualified snapshot
//!                  Broadcaster (current snapshot + subscribers)
//!                         |
//!               subscribers (WebSocket, reconcilers)
//! ```
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration and startup validation
//! - [`scoring`] -- The qualification heuristic
//! - [`store`] -- Read-only store seam plus an in-memory implementation
//! - [`poller`] -- Change detection state machine and timer loop
//! - [`broadcast`] -- Snapshot fan-out to subscribers
//! - [`shutdown`] -- Cancellation signal shared by long-running tasks

pub mod broadcast;
pub mod config;
pub mod poller;
pub mod scoring;
pub mod shutdown;
pub mod store;

pub use broadcast::{Broadcaster, PublishError, Subscription, SubscriptionClosed};
pub use config::{CheckmateConfig, ConfigError, ScoringConfig};
pub use poller::{ChangePoller, PollerPhase, PollerStatus, TickOutcome};
pub use scoring::{qualified_snapshot, score};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use store::{CandidateRace, MalformedRace, MemoryStore, RaceStore, StoreError};
