//! The qualification heuristic.
//!
//! [`score`] turns one [`Race`] into a [`ScoredRace`]. It is pure: the same
//! race and configuration always produce the same factors, score, and
//! verdict, and nothing outside the returned value is touched.
//!
//! Three factors are evaluated:
//!
//! | Factor               | Passes when                                   |
//! |----------------------|-----------------------------------------------|
//! | `fieldSize`          | field size in the optimal (or acceptable) band |
//! | `favoriteOdds`       | favorite best odds `<= max_odds`              |
//! | `secondFavoriteOdds` | second-favorite best odds `>= min_odds`       |
//!
//! Scratched runners never rank. A runner without a valid quote still counts
//! toward field size but cannot be favorite or second favorite.

use std::cmp::Ordering;

use checkmate_types::{Factor, FactorMap, Race, Runner, RunnerView, ScoredRace};
use rust_decimal::Decimal;

use crate::config::{FavoriteOddsConfig, FieldSizeConfig, ScoringConfig, SecondFavoriteOddsConfig};

/// Score a single race.
pub fn score(race: &Race, config: &ScoringConfig) -> ScoredRace {
    let active: Vec<&Runner> = race.runners.iter().filter(|r| !r.scratched).collect();

    let counted = if config.field_size.count_scratched {
        race.runners.len()
    } else {
        active.len()
    };
    let field_size = u32::try_from(counted).unwrap_or(u32::MAX);

    let ranked = rank_by_best_odds(&active);

    let factors = FactorMap {
        field_size: field_size_factor(field_size, &config.field_size),
        favorite_odds: favorite_factor(ranked.first().copied(), &config.favorite_odds),
        second_favorite_odds: second_favorite_factor(
            ranked.get(1).copied(),
            &config.second_favorite_odds,
        ),
    };

    let total = factors.total_points();

    ScoredRace {
        id: race.id.clone(),
        venue: race.venue.clone(),
        race_number: race.race_number,
        post_time: race.post_time,
        source: race.source.clone(),
        score: total,
        qualified: total >= config.qualification_threshold,
        factors,
        runners: race.runners.iter().map(RunnerView::from).collect(),
        updated_at: race.updated_at,
    }
}

/// Score every race and keep the qualified ones, best first.
///
/// Order: score descending, then post time ascending, then race id.
pub fn qualified_snapshot<'a, I>(races: I, config: &ScoringConfig) -> Vec<ScoredRace>
where
    I: IntoIterator<Item = &'a Race>,
{
    let mut qualified: Vec<ScoredRace> = races
        .into_iter()
        .map(|race| score(race, config))
        .filter(|scored| scored.qualified)
        .collect();
    qualified.sort_by(snapshot_order);
    qualified
}

fn snapshot_order(a: &ScoredRace, b: &ScoredRace) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.post_time.cmp(&b.post_time))
        .then_with(|| a.id.cmp(&b.id))
}

/// Active runners with a valid quote, ascending by best odds then number.
fn rank_by_best_odds(active: &[&Runner]) -> Vec<Decimal> {
    let mut ranked: Vec<(Decimal, u32)> = active
        .iter()
        .filter_map(|runner| runner.best_odds().map(|odds| (odds, runner.number)))
        .collect();
    ranked.sort_unstable();
    ranked.into_iter().map(|(odds, _)| odds).collect()
}

fn field_size_factor(count: u32, config: &FieldSizeConfig) -> Factor {
    if (config.min..=config.max).contains(&count) {
        return Factor {
            points: config.ok_points,
            ok: true,
            reason: format!(
                "Optimal field size ({count} runners, range {}-{})",
                config.min, config.max
            ),
        };
    }

    if let Some(band) = config
        .acceptable
        .as_ref()
        .filter(|band| (band.min..=band.max).contains(&count))
    {
        return Factor {
            points: band.points,
            ok: true,
            reason: format!(
                "Acceptable field size ({count} runners, range {}-{})",
                band.min, band.max
            ),
        };
    }

    Factor {
        points: config.fail_points,
        ok: false,
        reason: format!(
            "Field size not ideal ({count} runners, optimal {}-{})",
            config.min, config.max
        ),
    }
}

fn favorite_factor(favorite: Option<Decimal>, config: &FavoriteOddsConfig) -> Factor {
    match favorite {
        Some(odds) if odds <= config.max_odds => Factor {
            points: config.ok_points,
            ok: true,
            reason: format!("Favorite odds OK ({odds:.2} <= {:.2})", config.max_odds),
        },
        Some(odds) => Factor {
            points: config.fail_points,
            ok: false,
            reason: format!("Favorite odds too high ({odds:.2} > {:.2})", config.max_odds),
        },
        None => Factor {
            points: config.fail_points,
            ok: false,
            reason: String::from("No runner with valid odds to rank as favorite"),
        },
    }
}

fn second_favorite_factor(second: Option<Decimal>, config: &SecondFavoriteOddsConfig) -> Factor {
    match second {
        Some(odds) if odds >= config.min_odds => Factor {
            points: config.ok_points,
            ok: true,
            reason: format!("2nd favorite odds OK ({odds:.2} >= {:.2})", config.min_odds),
        },
        Some(odds) => Factor {
            points: config.fail_points,
            ok: false,
            reason: format!("2nd favorite odds too low ({odds:.2} < {:.2})", config.min_odds),
        },
        None => Factor {
            points: config.fail_points,
            ok: false,
            reason: String::from("Fewer than two runners with valid odds"),
        },
    }
}
