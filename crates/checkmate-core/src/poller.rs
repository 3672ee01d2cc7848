//! Change detection over the append-only change log.
//!
//! The [`ChangePoller`] owns a private cursor: the highest change-log id it
//! has fully processed. Every tick it asks the store for anything newer.
//! When something is found it reads all candidate races, scores them,
//! publishes the qualified snapshot, and only then advances the cursor.
//!
//! ```text
//! Idle --tick--> Checking --nothing new--> Idle
//!                    |
//!                    +--store error--> Idle (cursor kept, retried next tick)
//!                    |
//!                    +--changed--> Refreshing --published--> Idle (cursor advanced)
//!                                      |
//!                                      +--store error--> Idle (cursor kept)
//! ```
//!
//! Store errors are never fatal. They are logged, counted in the
//! [`PollerStatus`], and the same work is retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use checkmate_types::{EventId, Race, Snapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::broadcast::{Broadcaster, PublishError};
use crate::config::ScoringConfig;
use crate::scoring::qualified_snapshot;
use crate::shutdown::ShutdownSignal;
use crate::store::{RaceStore, StoreError};

/// Where the poller is in its cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollerPhase {
    /// Waiting for the next tick.
    #[default]
    Idle,
    /// Querying the change log.
    Checking,
    /// Reading, scoring, and publishing a new snapshot.
    Refreshing,
}

/// Health of the poller, published after every state change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollerStatus {
    /// Current phase.
    pub phase: PollerPhase,
    /// Highest change-log id fully processed.
    pub cursor: EventId,
    /// Completed ticks, successful or not.
    pub ticks: u64,
    /// When the last tick finished.
    pub last_tick_at: Option<DateTime<Utc>>,
    /// When a change was last published.
    pub last_change_at: Option<DateTime<Utc>>,
    /// Failed ticks since the last successful one.
    pub consecutive_failures: u32,
    /// Message of the most recent failure, cleared on success.
    pub last_error: Option<String>,
}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing newer than the cursor; nothing published.
    Unchanged,
    /// A new snapshot was published and the cursor advanced.
    Published {
        /// The new cursor.
        cursor: EventId,
        /// Races in the snapshot.
        qualified: usize,
        /// Candidate races skipped as malformed.
        rejected: usize,
    },
    /// A store query failed; the cursor did not move.
    Failed {
        /// The store error.
        error: StoreError,
    },
}

/// Watches the change log and feeds the [`Broadcaster`].
pub struct ChangePoller<S> {
    store: Arc<S>,
    scoring: ScoringConfig,
    broadcaster: Arc<Broadcaster>,
    interval: Duration,
    cursor: EventId,
    status: watch::Sender<PollerStatus>,
}

impl<S: RaceStore> ChangePoller<S> {
    /// Create a poller starting from an empty cursor.
    ///
    /// The first tick that finds any change-log entry publishes a full
    /// snapshot, so subscribers get data right after startup.
    pub fn new(
        store: Arc<S>,
        scoring: ScoringConfig,
        broadcaster: Arc<Broadcaster>,
        interval: Duration,
    ) -> Self {
        let (status, _rx) = watch::channel(PollerStatus::default());
        Self {
            store,
            scoring,
            broadcaster,
            interval,
            cursor: EventId::ZERO,
            status,
        }
    }

    /// Highest change-log id fully processed.
    pub const fn cursor(&self) -> EventId {
        self.cursor
    }

    /// A receiver that always holds the latest [`PollerStatus`].
    pub fn status(&self) -> watch::Receiver<PollerStatus> {
        self.status.subscribe()
    }

    /// Run one poll cycle.
    pub async fn tick(&mut self) -> TickOutcome {
        self.set_phase(PollerPhase::Checking);

        let found = match self.store.max_event_after(self.cursor).await {
            Ok(found) => found,
            Err(error) => return self.fail(error),
        };

        let Some(found) = found.filter(|id| *id > self.cursor) else {
            debug!(cursor = %self.cursor, "no changes");
            self.finish(None);
            return TickOutcome::Unchanged;
        };

        self.set_phase(PollerPhase::Refreshing);
        debug!(cursor = %self.cursor, found = %found, "change detected");

        let candidates = match self.store.candidate_races().await {
            Ok(candidates) => candidates,
            Err(error) => return self.fail(error),
        };

        let mut races: Vec<Race> = Vec::with_capacity(candidates.len());
        let mut rejected: usize = 0;
        for candidate in candidates {
            match candidate {
                Ok(race) => races.push(race),
                Err(malformed) => {
                    rejected = rejected.saturating_add(1);
                    warn!(
                        race_id = %malformed.race_id,
                        reason = %malformed.reason,
                        "skipping malformed race"
                    );
                }
            }
        }

        let scored = qualified_snapshot(&races, &self.scoring);
        let qualified = scored.len();

        match self.store.adapter_statuses().await {
            Ok(statuses) => self.broadcaster.set_adapter_statuses(statuses).await,
            Err(error) => warn!(error = %error, "adapter statuses unavailable, keeping previous"),
        }

        let snapshot = Snapshot {
            cursor: found,
            generated_at: Utc::now(),
            races: scored,
        };

        match self.broadcaster.publish(snapshot).await {
            Ok(delivered) => {
                info!(
                    cursor = %found,
                    candidates = races.len(),
                    qualified,
                    rejected,
                    delivered,
                    "snapshot refreshed"
                );
            }
            Err(PublishError::Stale { offered, current }) => {
                warn!(%offered, %current, "broadcaster already holds a newer snapshot");
            }
        }

        self.cursor = found;
        self.finish(Some(Utc::now()));
        TickOutcome::Published {
            cursor: found,
            qualified,
            rejected,
        }
    }

    /// Tick on the configured interval until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        match self.store.latest_event_id().await {
            Ok(head) => info!(
                head = ?head.map(EventId::get),
                interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
                "change poller started"
            ),
            Err(error) => warn!(error = %error, "change poller started with store unavailable"),
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        info!(cursor = %self.cursor, "change poller stopped");
    }

    fn set_phase(&self, phase: PollerPhase) {
        self.status.send_modify(|status| status.phase = phase);
    }

    fn fail(&self, error: StoreError) -> TickOutcome {
        let failures = self.status.borrow().consecutive_failures.saturating_add(1);
        warn!(
            cursor = %self.cursor,
            consecutive_failures = failures,
            error = %error,
            "poll failed, retrying next tick"
        );
        let message = error.to_string();
        self.status.send_modify(|status| {
            status.phase = PollerPhase::Idle;
            status.ticks = status.ticks.saturating_add(1);
            status.last_tick_at = Some(Utc::now());
            status.consecutive_failures = failures;
            status.last_error = Some(message);
        });
        TickOutcome::Failed { error }
    }

    fn finish(&self, changed_at: Option<DateTime<Utc>>) {
        let cursor = self.cursor;
        self.status.send_modify(|status| {
            status.phase = PollerPhase::Idle;
            status.cursor = cursor;
            status.ticks = status.ticks.saturating_add(1);
            status.last_tick_at = Some(Utc::now());
            status.consecutive_failures = 0;
            status.last_error = None;
            if changed_at.is_some() {
                status.last_change_at = changed_at;
            }
        });
    }
}
