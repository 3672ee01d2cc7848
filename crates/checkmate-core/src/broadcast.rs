//! Snapshot fan-out.
//!
//! The [`Broadcaster`] keeps the last published [`Snapshot`] and a
//! `tokio::sync::broadcast` channel to every live [`Subscription`].
//!
//! Publishing and subscribing both happen under the same lock, so a new
//! subscriber either sees a snapshot as its initial value or receives it
//! from the channel, never both and never neither. Each subscriber reads
//! the channel at its own pace; one that falls more than the configured
//! capacity behind loses the oldest snapshots and continues with the
//! newest, which is safe because every snapshot is a whole replacement.

use std::sync::Arc;

use checkmate_types::{AdapterStatus, EventId, Snapshot, SubscriberId};
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info, warn};

/// Reasons a publish is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// The snapshot is older than the one already published.
    #[error("stale snapshot: cursor {offered} is behind current cursor {current}")]
    Stale {
        /// Cursor of the refused snapshot.
        offered: EventId,
        /// Cursor of the current snapshot.
        current: EventId,
    },
}

/// The broadcaster was dropped; no more snapshots will arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("broadcaster closed")]
pub struct SubscriptionClosed;

/// Holds the current snapshot and fans new ones out to subscribers.
#[derive(Debug)]
pub struct Broadcaster {
    tx: broadcast::Sender<Arc<Snapshot>>,
    current: Mutex<Option<Arc<Snapshot>>>,
    adapter_statuses: RwLock<Vec<AdapterStatus>>,
}

impl Broadcaster {
    /// Create a broadcaster buffering up to `capacity` snapshots per subscriber.
    ///
    /// `capacity` must be non-zero; configuration validation guarantees it.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        info!(capacity, "snapshot broadcaster initialized");
        Self {
            tx,
            current: Mutex::new(None),
            adapter_statuses: RwLock::new(Vec::new()),
        }
    }

    /// Register a subscriber.
    ///
    /// The returned subscription's [`Subscription::initial`] holds the last
    /// known snapshot, or `None` when nothing was published yet.
    pub async fn subscribe(&self) -> Subscription {
        let current = self.current.lock().await;
        let subscription = Subscription {
            id: SubscriberId::new(),
            initial: current.clone(),
            rx: self.tx.subscribe(),
            last_cursor: current.as_ref().map(|snapshot| snapshot.cursor),
        };
        drop(current);

        debug!(
            subscriber_id = %subscription.id,
            subscribers = self.tx.receiver_count(),
            "subscriber registered"
        );
        subscription
    }

    /// Release a subscription. Equivalent to dropping it.
    pub fn unsubscribe(&self, subscription: Subscription) {
        let id = subscription.id;
        drop(subscription);
        debug!(
            subscriber_id = %id,
            subscribers = self.tx.receiver_count(),
            "subscriber released"
        );
    }

    /// Make `snapshot` current and deliver it to every subscriber.
    ///
    /// Returns the number of subscribers it was queued for. A snapshot
    /// whose cursor is lower than the current one is refused.
    pub async fn publish(&self, snapshot: Snapshot) -> Result<usize, PublishError> {
        let mut current = self.current.lock().await;

        if let Some(existing) = current
            .as_ref()
            .filter(|existing| snapshot.cursor < existing.cursor)
        {
            return Err(PublishError::Stale {
                offered: snapshot.cursor,
                current: existing.cursor,
            });
        }

        let snapshot = Arc::new(snapshot);
        *current = Some(Arc::clone(&snapshot));
        let cursor = snapshot.cursor;
        let races = snapshot.races.len();

        // No receivers is not an error: the snapshot is still current.
        let delivered = self.tx.send(snapshot).unwrap_or(0);
        drop(current);

        debug!(%cursor, races, delivered, "snapshot published");
        Ok(delivered)
    }

    /// The last published snapshot, if any.
    pub async fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.lock().await.clone()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Replace the adapter statuses observed on the last refresh.
    pub async fn set_adapter_statuses(&self, statuses: Vec<AdapterStatus>) {
        *self.adapter_statuses.write().await = statuses;
    }

    /// Adapter statuses observed on the last refresh.
    pub async fn adapter_statuses(&self) -> Vec<AdapterStatus> {
        self.adapter_statuses.read().await.clone()
    }
}

/// A live registration with a [`Broadcaster`].
///
/// Dropping the subscription releases it.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    initial: Option<Arc<Snapshot>>,
    rx: broadcast::Receiver<Arc<Snapshot>>,
    last_cursor: Option<EventId>,
}

impl Subscription {
    /// Identifier for logging.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Snapshot current at subscription time; `None` is the empty marker.
    pub fn initial(&self) -> Option<Arc<Snapshot>> {
        self.initial.clone()
    }

    /// Wait for the next published snapshot.
    ///
    /// Snapshots dropped because this subscriber fell behind are skipped;
    /// the next one returned is always newer than anything returned before.
    pub async fn recv(&mut self) -> Result<Arc<Snapshot>, SubscriptionClosed> {
        loop {
            match self.rx.recv().await {
                Ok(snapshot) => {
                    if self.last_cursor.is_some_and(|last| snapshot.cursor < last) {
                        continue;
                    }
                    self.last_cursor = Some(snapshot.cursor);
                    return Ok(snapshot);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(subscriber_id = %self.id, skipped, "slow subscriber dropped oldest snapshots");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(SubscriptionClosed),
            }
        }
    }
}
