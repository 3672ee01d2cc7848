//! Read-only [`RaceStore`] over the `races`, `runners`, `change_events`,
//! and `adapter_statuses` tables.
//!
//! Runner odds are stored as a JSONB object keyed by source name. A race
//! whose rows cannot be decoded (bad odds JSON, negative numbers, unknown
//! adapter status) is reported as a [`MalformedRace`] and the rest of the
//! candidate set is returned normally.

use std::collections::{BTreeMap, HashMap};

use checkmate_core::{CandidateRace, MalformedRace, RaceStore, StoreError};
use checkmate_types::{AdapterHealth, AdapterStatus, EventId, OddsQuote, Race, RaceId, Runner};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use crate::error::DbError;
use crate::postgres::PostgresPool;

/// `PostgreSQL` implementation of [`RaceStore`].
#[derive(Debug, Clone)]
pub struct PgRaceStore {
    pool: PostgresPool,
}

impl PgRaceStore {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    const fn pg(&self) -> &PgPool {
        self.pool.pool()
    }

    async fn query_latest_event_id(&self) -> Result<Option<EventId>, DbError> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM change_events")
            .fetch_one(self.pg())
            .await?;
        Ok(max.and_then(event_id_from_db))
    }

    async fn query_max_event_after(&self, cursor: EventId) -> Result<Option<EventId>, DbError> {
        let cursor_i64 = i64::try_from(cursor.get()).unwrap_or(i64::MAX);
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(id) FROM change_events WHERE id > $1")
                .bind(cursor_i64)
                .fetch_one(self.pg())
                .await?;
        Ok(max.and_then(event_id_from_db))
    }

    async fn query_candidate_races(&self) -> Result<Vec<CandidateRace>, DbError> {
        let races = sqlx::query_as::<_, RaceRow>(
            r"SELECT id, venue, race_number, post_time, source, updated_at
              FROM races
              ORDER BY post_time ASC, id ASC",
        )
        .fetch_all(self.pg())
        .await?;

        let runners = sqlx::query_as::<_, RunnerRow>(
            r"SELECT race_id, number, name, scratched, odds
              FROM runners
              ORDER BY race_id ASC, number ASC",
        )
        .fetch_all(self.pg())
        .await?;

        let mut by_race: HashMap<String, Vec<RunnerRow>> = HashMap::new();
        for runner in runners {
            by_race.entry(runner.race_id.clone()).or_default().push(runner);
        }

        Ok(races
            .into_iter()
            .map(|row| {
                let runners = by_race.remove(&row.id).unwrap_or_default();
                row.into_race(runners)
            })
            .collect())
    }

    async fn query_adapter_statuses(&self) -> Result<Vec<AdapterStatus>, DbError> {
        let rows = sqlx::query_as::<_, AdapterStatusRow>(
            r"SELECT adapter_name, status, last_run, races_found, error_message
              FROM adapter_statuses
              ORDER BY adapter_name ASC",
        )
        .fetch_all(self.pg())
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let name = row.adapter_name.clone();
                match row.into_status() {
                    Ok(status) => Some(status),
                    Err(reason) => {
                        tracing::warn!(adapter = %name, reason = %reason, "skipping adapter status row");
                        None
                    }
                }
            })
            .collect())
    }
}

impl RaceStore for PgRaceStore {
    async fn latest_event_id(&self) -> Result<Option<EventId>, StoreError> {
        Ok(self.query_latest_event_id().await?)
    }

    async fn max_event_after(&self, cursor: EventId) -> Result<Option<EventId>, StoreError> {
        Ok(self.query_max_event_after(cursor).await?)
    }

    async fn candidate_races(&self) -> Result<Vec<CandidateRace>, StoreError> {
        Ok(self.query_candidate_races().await?)
    }

    async fn adapter_statuses(&self) -> Result<Vec<AdapterStatus>, StoreError> {
        Ok(self.query_adapter_statuses().await?)
    }
}

fn event_id_from_db(id: i64) -> Option<EventId> {
    u64::try_from(id).ok().map(EventId)
}

// =============================================================================
// Row types
// =============================================================================

/// A row from the `races` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct RaceRow {
    id: String,
    venue: String,
    race_number: i32,
    post_time: DateTime<Utc>,
    source: String,
    updated_at: DateTime<Utc>,
}

impl RaceRow {
    fn into_race(self, runner_rows: Vec<RunnerRow>) -> CandidateRace {
        let race_id = RaceId::new(self.id.as_str());
        let malformed = |reason: String| MalformedRace {
            race_id: race_id.clone(),
            reason,
        };

        let race_number = u32::try_from(self.race_number)
            .map_err(|e| malformed(format!("race number {}: {e}", self.race_number)))?;

        let mut runners = Vec::with_capacity(runner_rows.len());
        for row in runner_rows {
            let number = u32::try_from(row.number)
                .map_err(|e| malformed(format!("runner number {}: {e}", row.number)))?;
            let odds = decode_runner_odds(&row.odds)
                .map_err(|e| malformed(format!("runner {number} odds: {e}")))?;
            runners.push(Runner {
                number,
                name: row.name,
                scratched: row.scratched,
                odds,
            });
        }

        Ok(Race {
            id: race_id,
            venue: self.venue,
            race_number,
            post_time: self.post_time,
            runners,
            source: self.source,
            updated_at: self.updated_at,
        })
    }
}

/// A row from the `runners` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct RunnerRow {
    race_id: String,
    number: i32,
    name: String,
    scratched: bool,
    odds: serde_json::Value,
}

/// A row from the `adapter_statuses` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct AdapterStatusRow {
    adapter_name: String,
    status: String,
    last_run: Option<DateTime<Utc>>,
    races_found: i32,
    error_message: Option<String>,
}

impl AdapterStatusRow {
    fn into_status(self) -> Result<AdapterStatus, String> {
        let status = AdapterHealth::parse(&self.status)
            .ok_or_else(|| format!("unknown status {:?}", self.status))?;
        let races_found = u32::try_from(self.races_found)
            .map_err(|e| format!("races_found {}: {e}", self.races_found))?;
        Ok(AdapterStatus {
            adapter_name: self.adapter_name,
            status,
            last_run: self.last_run,
            races_found,
            error_message: self.error_message,
        })
    }
}

/// One quote as stored inside the `runners.odds` JSONB object.
#[derive(Debug, Deserialize)]
struct StoredQuote {
    win_price: Option<Decimal>,
    updated_at: DateTime<Utc>,
}

/// Decode a `runners.odds` JSONB value into quotes keyed by source.
///
/// # Errors
///
/// Returns [`DbError::Serialization`] if the value is not an object of
/// `{"win_price": ..., "updated_at": ...}` entries.
pub fn decode_runner_odds(
    value: &serde_json::Value,
) -> Result<BTreeMap<String, OddsQuote>, DbError> {
    let stored: BTreeMap<String, StoredQuote> = serde_json::from_value(value.clone())?;
    Ok(stored
        .into_iter()
        .map(|(source, quote)| {
            let odds = OddsQuote {
                win_price: quote.win_price,
                source: source.clone(),
                updated_at: quote.updated_at,
            };
            (source, odds)
        })
        .collect())
}
