//! End-to-end tests: in-memory store -> change poller -> broadcaster -> subscribers.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use checkmate_core::config::{FavoriteOddsConfig, FieldSizeConfig, SecondFavoriteOddsConfig};
use checkmate_core::{
    Broadcaster, ChangePoller, MemoryStore, ScoringConfig, Shutdown, TickOutcome,
};
use checkmate_types::{EventId, OddsQuote, Race, RaceId, Runner};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn scoring() -> ScoringConfig {
    ScoringConfig {
        qualification_threshold: dec!(50),
        field_size: FieldSizeConfig {
            min: 6,
            max: 10,
            ok_points: dec!(20),
            fail_points: dec!(-20),
            acceptable: None,
            count_scratched: false,
        },
        favorite_odds: FavoriteOddsConfig {
            max_odds: dec!(3.0),
            ok_points: dec!(20),
            fail_points: dec!(-20),
        },
        second_favorite_odds: SecondFavoriteOddsConfig {
            min_odds: dec!(4.0),
            ok_points: dec!(20),
            fail_points: dec!(-20),
        },
    }
}

fn race(id: &str, field: u32) -> Race {
    let runners = (1..=field)
        .map(|number| {
            let price = match number {
                1 => dec!(2.0),
                2 => dec!(4.5),
                n => Decimal::from(n).checked_add(dec!(8.0)).unwrap(),
            };
            let quote = OddsQuote {
                win_price: Some(price),
                source: String::from("tote"),
                updated_at: Utc::now(),
            };
            Runner {
                number,
                name: format!("{id} #{number}"),
                scratched: false,
                odds: BTreeMap::from([(String::from("tote"), quote)]),
            }
        })
        .collect();
    Race {
        id: RaceId::new(id),
        venue: String::from("Churchill Downs"),
        race_number: 7,
        post_time: Utc::now(),
        runners,
        source: String::from("memory"),
        updated_at: Utc::now(),
    }
}

fn pipeline() -> (Arc<MemoryStore>, Arc<Broadcaster>, ChangePoller<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let broadcaster = Arc::new(Broadcaster::new(16));
    let poller = ChangePoller::new(
        Arc::clone(&store),
        scoring(),
        Arc::clone(&broadcaster),
        Duration::from_millis(5),
    );
    (store, broadcaster, poller)
}

#[tokio::test]
async fn qualified_races_reach_subscribers_with_scores() {
    let (store, broadcaster, mut poller) = pipeline();
    let mut subscription = broadcaster.subscribe().await;
    assert!(subscription.initial().is_none());

    store.upsert_race(race("eight", 8)).await;
    store.upsert_race(race("twelve", 12)).await;
    poller.tick().await;

    let snapshot = subscription.recv().await.unwrap();
    assert_eq!(snapshot.races.len(), 1);
    let scored = &snapshot.races[0];
    assert_eq!(scored.id.as_str(), "eight");
    assert_eq!(scored.score, dec!(60));
    assert!(scored.qualified);
}

#[tokio::test]
async fn no_event_beyond_cursor_means_no_publish() {
    let (store, broadcaster, mut poller) = pipeline();
    for _ in 0..41 {
        store.touch().await;
    }
    store.upsert_race(race("eight", 8)).await;
    assert!(matches!(
        poller.tick().await,
        TickOutcome::Published { cursor: EventId(42), .. }
    ));

    let mut subscription = broadcaster.subscribe().await;
    assert_eq!(subscription.initial().unwrap().cursor, EventId(42));

    assert_eq!(poller.tick().await, TickOutcome::Unchanged);
    assert_eq!(poller.cursor(), EventId(42));
    let nothing = tokio::time::timeout(Duration::from_millis(20), subscription.recv()).await;
    assert!(nothing.is_err(), "no snapshot may be published without a change");
}

#[tokio::test]
async fn store_error_defers_pending_event_to_next_tick() {
    let (store, broadcaster, mut poller) = pipeline();
    store.upsert_race(race("eight", 8)).await;
    poller.tick().await;
    let before = poller.cursor();

    let pending = store.upsert_race(race("nine", 9)).await;
    store.fail_next_queries(1).await;

    assert!(matches!(poller.tick().await, TickOutcome::Failed { .. }));
    assert_eq!(poller.cursor(), before);
    assert_eq!(broadcaster.current().await.unwrap().cursor, before);

    assert!(matches!(poller.tick().await, TickOutcome::Published { .. }));
    assert_eq!(poller.cursor(), pending);
    let current = broadcaster.current().await.unwrap();
    assert_eq!(current.cursor, pending);
    assert_eq!(current.races.len(), 2);
}

#[tokio::test]
async fn cursor_never_decreases_across_failures() {
    let (store, _broadcaster, mut poller) = pipeline();
    let mut last = poller.cursor();

    for step in 0..12_u32 {
        if step % 3 == 0 {
            store.upsert_race(race(&format!("r{step}"), 8)).await;
        }
        if step % 4 == 1 {
            store.fail_next_queries(1).await;
        }
        if step % 5 == 2 {
            store.fail_next_candidate_fetches(1).await;
        }
        poller.tick().await;
        assert!(poller.cursor() >= last);
        last = poller.cursor();
    }

    // Drain anything a failure deferred.
    poller.tick().await;
    assert_eq!(Some(poller.cursor()), store_head(&store).await);
}

async fn store_head(store: &MemoryStore) -> Option<EventId> {
    use checkmate_core::RaceStore;
    store.latest_event_id().await.unwrap()
}

#[tokio::test]
async fn running_poller_streams_updates_in_cursor_order() {
    let (store, broadcaster, poller) = pipeline();
    let mut subscription = broadcaster.subscribe().await;

    let shutdown = Shutdown::new();
    let task = tokio::spawn(poller.run(shutdown.signal()));

    let mut cursors = Vec::new();
    for i in 0..5_u32 {
        store.upsert_race(race(&format!("race-{i}"), 8)).await;
        let snapshot = subscription.recv().await.unwrap();
        cursors.push(snapshot.cursor);
    }

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();

    assert!(cursors.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(cursors.last().copied(), store_head(&store).await);
}
