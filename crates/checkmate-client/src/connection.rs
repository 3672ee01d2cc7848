//! Reconnecting `WebSocket` feed.
//!
//! [`LiveFeed::run`] connects to the observer stream, applies every text
//! frame to the shared [`LiveView`], and reconnects with exponential
//! backoff whenever the connection drops. The view keeps its rows while
//! disconnected. Every accepted change bumps a revision counter that
//! renderers can watch.
//!
//! # Connection Lifecycle
//!
//! 1. **Connecting**: open the socket; on failure wait out the backoff
//! 2. **Live**: reset the backoff, apply frames, answer pings
//! 3. **Disconnected**: record the instant, wait out the backoff, go to 1
//!
//! The loop ends only when the shutdown future resolves.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, ReconnectionConfig};
use crate::error::ClientError;
use crate::view::{ApplyOutcome, LiveView};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Exponential backoff state.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectionConfig,
    current_ms: u64,
    attempts: u32,
}

impl Backoff {
    /// Start at the configured initial delay.
    pub const fn new(config: ReconnectionConfig) -> Self {
        let current_ms = config.initial_delay_ms;
        Self {
            config,
            current_ms,
            attempts: 0,
        }
    }

    /// Return the delay for this attempt and grow the next one, capped at
    /// the configured maximum.
    pub fn next_delay(&mut self) -> Duration {
        let delay = Duration::from_millis(self.current_ms);
        self.current_ms = self
            .current_ms
            .saturating_mul(u64::from(self.config.backoff_multiplier))
            .min(self.config.max_delay_ms);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Go back to the initial delay after a successful connection.
    pub const fn reset(&mut self) {
        self.current_ms = self.config.initial_delay_ms;
        self.attempts = 0;
    }

    /// Failed attempts since the last reset.
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// How a live connection ended.
enum Disconnect {
    /// The shutdown future resolved.
    Shutdown,
    /// The server closed the stream.
    Closed,
}

/// Subscriber feed keeping a [`LiveView`] in sync with the server.
pub struct LiveFeed {
    url: String,
    backoff: Backoff,
    view: Arc<RwLock<LiveView>>,
    revision: watch::Sender<u64>,
}

impl LiveFeed {
    /// Create a feed for `config.url` with an empty view.
    pub fn new(config: &ClientConfig) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            url: config.url.clone(),
            backoff: Backoff::new(config.reconnection.clone()),
            view: Arc::new(RwLock::new(LiveView::new())),
            revision,
        }
    }

    /// Shared handle to the view.
    pub fn view(&self) -> Arc<RwLock<LiveView>> {
        Arc::clone(&self.view)
    }

    /// Watch channel bumped whenever the board or connection state changes.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Run until `shutdown` resolves, reconnecting as needed.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            self.view.write().set_connecting();
            self.bump();

            let connected = tokio::select! {
                biased;
                () = &mut shutdown => return,
                result = self.connect() => result,
            };

            match connected {
                Ok(socket) => {
                    self.backoff.reset();
                    self.view.write().set_live();
                    self.bump();
                    info!(url = %self.url, "Feed connected");

                    match self.stream(socket, &mut shutdown).await {
                        Ok(Disconnect::Shutdown) => return,
                        Ok(Disconnect::Closed) => warn!(url = %self.url, "Feed closed by server"),
                        Err(e) => warn!(url = %self.url, "Feed connection lost: {e}"),
                    }
                }
                Err(e) => warn!("{e}"),
            }

            self.view.write().set_disconnected(Utc::now());
            self.bump();

            let delay = self.backoff.next_delay();
            info!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                attempt = self.backoff.attempts(),
                "Reconnecting after delay"
            );
            tokio::select! {
                biased;
                () = &mut shutdown => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn connect(&self) -> Result<Socket, ClientError> {
        debug!(url = %self.url, "Connecting to feed");
        let (socket, _response) =
            connect_async(self.url.as_str())
                .await
                .map_err(|e| ClientError::Connect {
                    url: self.url.clone(),
                    message: e.to_string(),
                })?;
        Ok(socket)
    }

    /// Read frames until the connection ends or shutdown is requested.
    async fn stream<F>(
        &self,
        mut socket: Socket,
        shutdown: &mut std::pin::Pin<&mut F>,
    ) -> Result<Disconnect, ClientError>
    where
        F: Future<Output = ()>,
    {
        loop {
            let frame = tokio::select! {
                biased;
                () = shutdown.as_mut() => {
                    if let Err(e) = socket.close(None).await {
                        debug!("Close on shutdown failed: {e}");
                    }
                    return Ok(Disconnect::Shutdown);
                }
                frame = socket.next() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    let outcome = self.view.write().apply_text(&text);
                    if let ApplyOutcome::Applied { cursor, report } = outcome {
                        debug!(
                            %cursor,
                            inserted = report.inserted,
                            updated = report.updated,
                            removed = report.removed,
                            "Snapshot applied"
                        );
                        if report.changed() {
                            self.bump();
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    socket
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| ClientError::Transport {
                            message: e.to_string(),
                        })?;
                }
                Some(Ok(Message::Close(_))) | None => return Ok(Disconnect::Closed),
                Some(Err(e)) => {
                    return Err(ClientError::Transport {
                        message: e.to_string(),
                    });
                }
                Some(Ok(_)) => {}
            }
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff(initial: u64, max: u64, multiplier: u32) -> Backoff {
        Backoff::new(ReconnectionConfig {
            initial_delay_ms: initial,
            max_delay_ms: max,
            backoff_multiplier: multiplier,
        })
    }

    #[test]
    fn delays_grow_and_cap() {
        let mut backoff = backoff(100, 500, 2);
        let delays: Vec<u64> = (0..5)
            .map(|_| u64::try_from(backoff.next_delay().as_millis()).unwrap_or(u64::MAX))
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
        assert_eq!(backoff.attempts(), 5);
    }

    #[test]
    fn reset_returns_to_initial_delay() {
        let mut backoff = backoff(100, 10_000, 3);
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn multiplier_of_one_is_constant() {
        let mut backoff = backoff(250, 1_000, 1);
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
    }
}
