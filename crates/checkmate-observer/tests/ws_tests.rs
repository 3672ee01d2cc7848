//! `WebSocket` protocol tests against a real listener on an ephemeral port.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use checkmate_core::config::ObserverConfig;
use checkmate_core::{Broadcaster, PollerStatus, ScoringConfig, Shutdown};
use checkmate_observer::{AppState, spawn_observer};
use checkmate_types::{EventId, ServerMessage, Snapshot};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Harness {
    broadcaster: Arc<Broadcaster>,
    url: String,
    shutdown: Shutdown,
}

async fn start() -> Harness {
    let broadcaster = Arc::new(Broadcaster::new(8));
    let (_tx, rx) = watch::channel(PollerStatus::default());
    let state = Arc::new(AppState::new(
        Arc::clone(&broadcaster),
        rx,
        ScoringConfig::default(),
    ));
    let shutdown = Shutdown::new();
    let config = ObserverConfig {
        host: String::from("127.0.0.1"),
        port: 0,
    };
    let (addr, _handle) = spawn_observer(&config, state, shutdown.signal())
        .await
        .unwrap();
    Harness {
        broadcaster,
        url: format!("ws://{addr}/ws/races"),
        shutdown,
    }
}

fn snapshot(cursor: u64) -> Snapshot {
    Snapshot {
        cursor: EventId(cursor),
        generated_at: Utc::now(),
        races: Vec::new(),
    }
}

async fn next_message(client: &mut Client) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn wait_for_subscribers(broadcaster: &Broadcaster, count: usize) {
    for _ in 0..100 {
        if broadcaster.subscriber_count() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} subscribers, have {}", broadcaster.subscriber_count());
}

#[tokio::test]
async fn connect_before_first_publish_receives_empty_then_update() {
    let harness = start().await;
    let (mut client, _) = connect_async(harness.url.as_str()).await.unwrap();

    assert_eq!(next_message(&mut client).await, ServerMessage::Empty);

    harness.broadcaster.publish(snapshot(5)).await.unwrap();
    let ServerMessage::Update(update) = next_message(&mut client).await else {
        panic!("expected update");
    };
    assert_eq!(update.cursor, EventId(5));

    harness.shutdown.trigger();
}

#[tokio::test]
async fn connect_after_publish_receives_snapshot() {
    let harness = start().await;
    harness.broadcaster.publish(snapshot(9)).await.unwrap();

    let (mut client, _) = connect_async(harness.url.as_str()).await.unwrap();
    let ServerMessage::Snapshot(initial) = next_message(&mut client).await else {
        panic!("expected snapshot");
    };
    assert_eq!(initial.cursor, EventId(9));

    harness.shutdown.trigger();
}

#[tokio::test]
async fn refresh_resends_current_snapshot_and_ignores_other_frames() {
    let harness = start().await;
    harness.broadcaster.publish(snapshot(3)).await.unwrap();

    let (mut client, _) = connect_async(harness.url.as_str()).await.unwrap();
    next_message(&mut client).await;

    client
        .send(Message::Text(String::from(r#"{"type":"subscribe_all"}"#)))
        .await
        .unwrap();
    client
        .send(Message::Text(String::from("not json")))
        .await
        .unwrap();
    client
        .send(Message::Text(String::from(r#"{"type":"refresh"}"#)))
        .await
        .unwrap();

    let ServerMessage::Snapshot(again) = next_message(&mut client).await else {
        panic!("expected snapshot in answer to refresh");
    };
    assert_eq!(again.cursor, EventId(3));

    harness.shutdown.trigger();
}

#[tokio::test]
async fn updates_arrive_in_cursor_order() {
    let harness = start().await;
    let (mut client, _) = connect_async(harness.url.as_str()).await.unwrap();
    next_message(&mut client).await;

    for cursor in [1, 2, 4, 8] {
        harness.broadcaster.publish(snapshot(cursor)).await.unwrap();
    }

    let mut seen = Vec::new();
    for _ in 0..4 {
        if let ServerMessage::Update(update) = next_message(&mut client).await {
            seen.push(update.cursor.get());
        }
    }
    assert_eq!(seen, vec![1, 2, 4, 8]);

    harness.shutdown.trigger();
}

#[tokio::test]
async fn disconnect_releases_subscription() {
    let harness = start().await;
    let (mut first, _) = connect_async(harness.url.as_str()).await.unwrap();
    let (mut second, _) = connect_async(harness.url.as_str()).await.unwrap();
    next_message(&mut first).await;
    next_message(&mut second).await;
    wait_for_subscribers(&harness.broadcaster, 2).await;

    first.close(None).await.unwrap();
    drop(first);
    wait_for_subscribers(&harness.broadcaster, 1).await;

    harness.broadcaster.publish(snapshot(1)).await.unwrap();
    assert!(matches!(
        next_message(&mut second).await,
        ServerMessage::Update(_)
    ));

    harness.shutdown.trigger();
}

#[tokio::test]
async fn stalled_client_does_not_hold_back_others() {
    let harness = start().await;
    let (mut stalled, _) = connect_async(harness.url.as_str()).await.unwrap();
    let (mut active, _) = connect_async(harness.url.as_str()).await.unwrap();
    next_message(&mut stalled).await;
    next_message(&mut active).await;
    wait_for_subscribers(&harness.broadcaster, 2).await;

    let reader = tokio::spawn(async move {
        let mut seen = Vec::new();
        while seen.len() < 200 {
            if let ServerMessage::Update(update) = next_message(&mut active).await {
                seen.push(update.cursor.get());
            }
        }
        seen
    });

    // `stalled` reads nothing while these go out.
    for cursor in 1..=200 {
        harness.broadcaster.publish(snapshot(cursor)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let seen = tokio::time::timeout(Duration::from_secs(10), reader)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen, (1..=200).collect::<Vec<u64>>());
    assert_eq!(harness.broadcaster.subscriber_count(), 2);

    // The stalled client still gets frames in cursor order once it reads.
    let mut last = 0;
    for _ in 0..5 {
        if let ServerMessage::Update(update) = next_message(&mut stalled).await {
            assert!(update.cursor.get() > last);
            last = update.cursor.get();
        }
    }

    harness.shutdown.trigger();
}
