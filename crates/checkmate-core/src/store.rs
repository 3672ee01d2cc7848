//! Read-only access to races, the change log, and adapter statuses.
//!
//! [`RaceStore`] is the only way the pipeline sees persisted data. The
//! `PostgreSQL` implementation lives in `checkmate-db`; [`MemoryStore`] is a
//! process-local implementation used by tests and demos. It also exposes the
//! write side (upserts append change events) so ingestion can be simulated.

use std::collections::BTreeMap;
use std::future::Future;

use checkmate_types::{AdapterStatus, ChangeEvent, EventId, Race, RaceId};
use chrono::Utc;
use tokio::sync::Mutex;

/// Errors surfaced by a store query.
///
/// Every variant is transient from the poller's point of view: the tick is
/// skipped and retried on the next interval.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached (connection refused, pool timeout).
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// A query reached the store but failed.
    #[error("store query failed: {message}")]
    Query {
        /// Description of the failure.
        message: String,
    },
}

/// A stored race that could not be turned into a [`Race`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed race {race_id}: {reason}")]
pub struct MalformedRace {
    /// Id of the offending race.
    pub race_id: RaceId,
    /// What was wrong with it.
    pub reason: String,
}

/// One row of the candidate set: a race, or the reason it was unreadable.
pub type CandidateRace = Result<Race, MalformedRace>;

/// Read-only store seam consumed by the change poller.
pub trait RaceStore: Send + Sync {
    /// Highest id in the change log, `None` when the log is empty.
    fn latest_event_id(&self) -> impl Future<Output = Result<Option<EventId>, StoreError>> + Send;

    /// Highest id strictly greater than `cursor`, `None` when nothing is new.
    fn max_event_after(
        &self,
        cursor: EventId,
    ) -> impl Future<Output = Result<Option<EventId>, StoreError>> + Send;

    /// All races eligible for scoring.
    ///
    /// A race whose stored data cannot be decoded is returned as
    /// `Err(MalformedRace)` instead of failing the whole fetch.
    fn candidate_races(
        &self,
    ) -> impl Future<Output = Result<Vec<CandidateRace>, StoreError>> + Send;

    /// Latest status of every ingestion adapter.
    fn adapter_statuses(&self)
    -> impl Future<Output = Result<Vec<AdapterStatus>, StoreError>> + Send;
}

#[derive(Debug, Default)]
struct MemoryState {
    races: BTreeMap<RaceId, CandidateRace>,
    events: Vec<ChangeEvent>,
    statuses: Vec<AdapterStatus>,
    failures_pending: u32,
    fetch_failures_pending: u32,
}

impl MemoryState {
    fn append_event(&mut self) -> EventId {
        let next = self
            .events
            .last()
            .map_or(EventId::ZERO, |event| event.id)
            .get()
            .saturating_add(1);
        let id = EventId(next);
        self.events.push(ChangeEvent {
            id,
            created_at: Utc::now(),
        });
        id
    }

    fn check_failure(&mut self) -> Result<(), StoreError> {
        if self.failures_pending == 0 {
            return Ok(());
        }
        self.failures_pending = self.failures_pending.saturating_sub(1);
        Err(StoreError::Unavailable {
            message: String::from("injected failure"),
        })
    }
}

/// In-memory [`RaceStore`] with a simulated ingestion side.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store with an empty change log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a race and append a change event. Returns the event id.
    pub async fn upsert_race(&self, race: Race) -> EventId {
        let mut state = self.state.lock().await;
        state.races.insert(race.id.clone(), Ok(race));
        state.append_event()
    }

    /// Remove a race and append a change event. Returns the event id.
    pub async fn remove_race(&self, race_id: &RaceId) -> EventId {
        let mut state = self.state.lock().await;
        state.races.remove(race_id);
        state.append_event()
    }

    /// Store a race whose data cannot be decoded and append a change event.
    pub async fn insert_malformed(&self, race_id: RaceId, reason: impl Into<String>) -> EventId {
        let mut state = self.state.lock().await;
        let malformed = MalformedRace {
            race_id: race_id.clone(),
            reason: reason.into(),
        };
        state.races.insert(race_id, Err(malformed));
        state.append_event()
    }

    /// Append a change event without touching any race.
    pub async fn touch(&self) -> EventId {
        self.state.lock().await.append_event()
    }

    /// Replace the adapter status table. Does not append a change event.
    pub async fn set_adapter_statuses(&self, statuses: Vec<AdapterStatus>) {
        self.state.lock().await.statuses = statuses;
    }

    /// Make the next `count` queries fail with [`StoreError::Unavailable`].
    pub async fn fail_next_queries(&self, count: u32) {
        self.state.lock().await.failures_pending = count;
    }

    /// Make the next `count` candidate fetches fail while change-log queries
    /// keep succeeding.
    pub async fn fail_next_candidate_fetches(&self, count: u32) {
        self.state.lock().await.fetch_failures_pending = count;
    }

    /// Number of entries in the change log.
    pub async fn event_count(&self) -> usize {
        self.state.lock().await.events.len()
    }
}

impl RaceStore for MemoryStore {
    async fn latest_event_id(&self) -> Result<Option<EventId>, StoreError> {
        let mut state = self.state.lock().await;
        state.check_failure()?;
        Ok(state.events.last().map(|event| event.id))
    }

    async fn max_event_after(&self, cursor: EventId) -> Result<Option<EventId>, StoreError> {
        let mut state = self.state.lock().await;
        state.check_failure()?;
        Ok(state
            .events
            .iter()
            .map(|event| event.id)
            .filter(|id| *id > cursor)
            .max())
    }

    async fn candidate_races(&self) -> Result<Vec<CandidateRace>, StoreError> {
        let mut state = self.state.lock().await;
        state.check_failure()?;
        if state.fetch_failures_pending > 0 {
            state.fetch_failures_pending = state.fetch_failures_pending.saturating_sub(1);
            return Err(StoreError::Query {
                message: String::from("injected candidate fetch failure"),
            });
        }
        Ok(state.races.values().cloned().collect())
    }

    async fn adapter_statuses(&self) -> Result<Vec<AdapterStatus>, StoreError> {
        let mut state = self.state.lock().await;
        state.check_failure()?;
        Ok(state.statuses.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use checkmate_types::AdapterHealth;
    use chrono::Utc;

    use super::*;

    fn race(id: &str) -> Race {
        Race {
            id: RaceId::new(id),
            venue: String::from("Saratoga"),
            race_number: 1,
            post_time: Utc::now(),
            runners: Vec::new(),
            source: String::from("memory"),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn empty_store_has_no_events() {
        let store = MemoryStore::new();
        assert_eq!(store.latest_event_id().await.unwrap(), None);
        assert_eq!(store.max_event_after(EventId::ZERO).await.unwrap(), None);
        assert!(store.candidate_races().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mutations_append_strictly_increasing_events() {
        let store = MemoryStore::new();
        let first = store.upsert_race(race("a")).await;
        let second = store.upsert_race(race("b")).await;
        let third = store.remove_race(&RaceId::new("a")).await;

        assert!(first < second && second < third);
        assert_eq!(store.latest_event_id().await.unwrap(), Some(third));
        assert_eq!(store.event_count().await, 3);

        let remaining = store.candidate_races().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].as_ref().unwrap().id.as_str(), "b");
    }

    #[tokio::test]
    async fn max_event_after_is_strictly_greater() {
        let store = MemoryStore::new();
        let first = store.touch().await;
        let second = store.touch().await;

        assert_eq!(store.max_event_after(EventId::ZERO).await.unwrap(), Some(second));
        assert_eq!(store.max_event_after(first).await.unwrap(), Some(second));
        assert_eq!(store.max_event_after(second).await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_races_are_returned_as_errors() {
        let store = MemoryStore::new();
        store.insert_malformed(RaceId::new("bad"), "odds column is not an object").await;
        store.upsert_race(race("good")).await;

        let candidates = store.candidate_races().await.unwrap();
        let malformed: Vec<&MalformedRace> =
            candidates.iter().filter_map(|c| c.as_ref().err()).collect();
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].race_id.as_str(), "bad");
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let store = MemoryStore::new();
        store.touch().await;
        store.fail_next_queries(2).await;

        assert!(matches!(
            store.latest_event_id().await,
            Err(StoreError::Unavailable { .. })
        ));
        assert!(store.candidate_races().await.is_err());
        assert!(store.latest_event_id().await.is_ok());
    }

    #[tokio::test]
    async fn adapter_statuses_pass_through() {
        let store = MemoryStore::new();
        store
            .set_adapter_statuses(vec![AdapterStatus {
                adapter_name: String::from("tvg"),
                status: AdapterHealth::Error,
                last_run: None,
                races_found: 0,
                error_message: Some(String::from("HTTP 503")),
            }])
            .await;

        let statuses = store.adapter_statuses().await.unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].status, AdapterHealth::Error);
        assert_eq!(store.event_count().await, 0);
    }
}
