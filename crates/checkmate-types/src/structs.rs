//! Core entity structs: races as read from the store, and races as scored
//! for broadcast.
//!
//! A [`Race`] is what ingestion wrote. A [`ScoredRace`] is what the scoring
//! engine derived from it; score, qualified flag, and factors only ever
//! travel together inside a [`ScoredRace`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{AdapterHealth, FactorKey};
use crate::ids::{EventId, RaceId};

// ---------------------------------------------------------------------------
// Odds and runners
// ---------------------------------------------------------------------------

/// A single win-price quote for a runner from one odds source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct OddsQuote {
    /// Decimal win price. `None` when the source lists the runner without a price.
    #[ts(as = "Option<String>")]
    pub win_price: Option<Decimal>,
    /// Name of the odds source (bookmaker, exchange, adapter).
    pub source: String,
    /// When the source last refreshed this price.
    pub updated_at: DateTime<Utc>,
}

impl OddsQuote {
    /// The win price if it is usable for ranking (present and strictly positive).
    pub fn valid_price(&self) -> Option<Decimal> {
        self.win_price.filter(|price| price.is_sign_positive() && !price.is_zero())
    }
}

/// A runner entered in a race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Runner {
    /// Program number, unique within the race.
    pub number: u32,
    /// Horse name.
    pub name: String,
    /// Whether the runner has been withdrawn.
    pub scratched: bool,
    /// Quotes keyed by odds-source name.
    pub odds: BTreeMap<String, OddsQuote>,
}

impl Runner {
    /// The quote with the lowest valid win price across all sources.
    ///
    /// Ties keep the quote from the alphabetically first source so the
    /// result is deterministic.
    pub fn best_quote(&self) -> Option<&OddsQuote> {
        self.odds
            .values()
            .filter_map(|quote| quote.valid_price().map(|price| (price, quote)))
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, quote)| quote)
    }

    /// The best (lowest) valid win price across all sources.
    pub fn best_odds(&self) -> Option<Decimal> {
        self.best_quote().and_then(OddsQuote::valid_price)
    }
}

/// A race as written by ingestion and read from the store. Never scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Race {
    /// Stable race identifier.
    pub id: RaceId,
    /// Track / venue name.
    pub venue: String,
    /// Race number on the card.
    pub race_number: u32,
    /// Scheduled post time.
    pub post_time: DateTime<Utc>,
    /// Runners in program order.
    pub runners: Vec<Runner>,
    /// Tag of the adapter that produced the race.
    pub source: String,
    /// Last time ingestion touched the race.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Scoring output
// ---------------------------------------------------------------------------

/// One scored factor of the qualification heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Factor {
    /// Signed contribution to the score.
    #[ts(as = "String")]
    pub points: Decimal,
    /// Whether the factor's condition was met.
    pub ok: bool,
    /// Human-readable explanation.
    pub reason: String,
}

/// The complete factor map. Always carries exactly the three fixed keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct FactorMap {
    /// Field-size factor.
    pub field_size: Factor,
    /// Favorite-odds factor.
    pub favorite_odds: Factor,
    /// Second-favorite-odds factor.
    pub second_favorite_odds: Factor,
}

impl FactorMap {
    /// Look up a factor by key.
    pub const fn get(&self, key: FactorKey) -> &Factor {
        match key {
            FactorKey::FieldSize => &self.field_size,
            FactorKey::FavoriteOdds => &self.favorite_odds,
            FactorKey::SecondFavoriteOdds => &self.second_favorite_odds,
        }
    }

    /// Iterate factors in canonical key order.
    pub fn iter(&self) -> impl Iterator<Item = (FactorKey, &Factor)> {
        FactorKey::ALL.into_iter().map(|key| (key, self.get(key)))
    }

    /// Sum of all factor points.
    pub fn total_points(&self) -> Decimal {
        self.iter()
            .fold(Decimal::ZERO, |acc, (_, factor)| acc.saturating_add(factor.points))
    }
}

/// A runner as shown to subscribers: odds resolved to the single best quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RunnerView {
    /// Program number.
    pub number: u32,
    /// Horse name.
    pub name: String,
    /// Whether the runner has been withdrawn.
    pub scratched: bool,
    /// Lowest valid quote across sources, if any.
    pub best_quote: Option<OddsQuote>,
}

impl From<&Runner> for RunnerView {
    fn from(runner: &Runner) -> Self {
        Self {
            number: runner.number,
            name: runner.name.clone(),
            scratched: runner.scratched,
            best_quote: runner.best_quote().cloned(),
        }
    }
}

/// A race after scoring, as carried in snapshots.
///
/// Produced by the scoring engine; `score`, `qualified` and `factors` are
/// always computed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ScoredRace {
    /// Stable race identifier.
    pub id: RaceId,
    /// Track / venue name.
    pub venue: String,
    /// Race number on the card.
    pub race_number: u32,
    /// Scheduled post time.
    pub post_time: DateTime<Utc>,
    /// Tag of the adapter that produced the race.
    pub source: String,
    /// Qualification (checkmate) score: the sum of factor points.
    #[ts(as = "String")]
    pub score: Decimal,
    /// Whether the score reached the configured threshold.
    pub qualified: bool,
    /// Per-factor breakdown.
    pub factors: FactorMap,
    /// Runners with best-odds-resolved quotes.
    pub runners: Vec<RunnerView>,
    /// Last time ingestion touched the race.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Pass-through records
// ---------------------------------------------------------------------------

/// Status of one ingestion adapter. Surfaced, never computed, by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AdapterStatus {
    /// Adapter name.
    pub adapter_name: String,
    /// Outcome of the last run.
    pub status: AdapterHealth,
    /// When the adapter last ran.
    pub last_run: Option<DateTime<Utc>>,
    /// Races found on the last run.
    pub races_found: u32,
    /// Error text when the last run failed.
    pub error_message: Option<String>,
}

/// An entry of the append-only change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChangeEvent {
    /// Strictly increasing id.
    pub id: EventId,
    /// When the underlying mutation was committed.
    pub created_at: DateTime<Utc>,
}
