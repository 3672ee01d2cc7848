//! Error types for the subscriber client.

use checkmate_types::RaceId;

/// A snapshot that cannot be merged into the local board.
///
/// The snapshot is rejected as a whole; the board keeps its last good
/// state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// The same race id appears more than once in one snapshot.
    #[error("duplicate race id in snapshot: {id}")]
    DuplicateRaceId {
        /// The repeated id.
        id: RaceId,
    },
}

/// Errors raised by the client crate.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Reading the client configuration file failed.
    #[error("failed to read client config: {0}")]
    Io(#[from] std::io::Error),

    /// The client configuration file is not valid YAML for [`ClientConfig`].
    ///
    /// [`ClientConfig`]: crate::config::ClientConfig
    #[error("failed to parse client config: {message}")]
    Yaml {
        /// Parser error text.
        message: String,
    },

    /// A configuration value is out of range.
    #[error("invalid client config field `{field}`: {reason}")]
    InvalidConfig {
        /// Offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Opening the `WebSocket` connection failed.
    #[error("failed to connect to {url}: {message}")]
    Connect {
        /// Feed URL.
        url: String,
        /// Transport error text.
        message: String,
    },

    /// The connection broke while reading or writing frames.
    #[error("websocket transport error: {message}")]
    Transport {
        /// Transport error text.
        message: String,
    },
}

impl From<serde_yml::Error> for ClientError {
    fn from(e: serde_yml::Error) -> Self {
        Self::Yaml {
            message: e.to_string(),
        }
    }
}
