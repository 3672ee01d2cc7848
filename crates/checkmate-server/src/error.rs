//! Error types for the server binary.
//!
//! [`ServerError`] is the top-level error type that wraps all possible
//! failure modes during startup and shutdown.

/// Top-level error for the server binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: checkmate_core::ConfigError,
    },

    /// The race store could not be set up.
    #[error("database error: {source}")]
    Database {
        /// The underlying database error.
        #[from]
        source: checkmate_db::DbError,
    },

    /// Observer API server failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying startup error.
        #[from]
        source: checkmate_observer::StartupError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {message}")]
    Signal {
        /// Description of the signal failure.
        message: String,
    },
}
