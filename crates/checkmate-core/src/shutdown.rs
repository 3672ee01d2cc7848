//! Cancellation signal for long-running tasks.
//!
//! One [`Shutdown`] is owned by the binary; every task that must stop on
//! shutdown holds a cloned [`ShutdownSignal`].

use tokio::sync::watch;

/// Owner side of the shutdown signal.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a signal that has not fired yet.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// A handle tasks can wait on.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Fire the signal. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver side of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Whether shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested or the owner is dropped.
    pub async fn cancelled(&mut self) {
        // An error means the sender is gone, which also ends the task.
        let _ = self.rx.wait_for(|fired| *fired).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn trigger_wakes_every_clone() {
        let shutdown = Shutdown::new();
        let mut first = shutdown.signal();
        let mut second = first.clone();
        assert!(!first.is_cancelled());

        shutdown.trigger();
        first.cancelled().await;
        second.cancelled().await;
        assert!(second.is_cancelled());
    }

    #[tokio::test]
    async fn signal_created_after_trigger_is_cancelled() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.signal().is_cancelled());
    }

    #[tokio::test]
    async fn dropping_owner_releases_waiters() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.signal();
        drop(shutdown);
        let waited = tokio::time::timeout(Duration::from_secs(1), signal.cancelled()).await;
        assert!(waited.is_ok());
    }

    #[tokio::test]
    async fn pending_until_triggered() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.signal();
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(waited.is_err());
    }
}
