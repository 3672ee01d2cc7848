//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`] errors. At the store seam they are collapsed into
//! [`StoreError`], which is all the poller needs to decide to retry.

use checkmate_core::StoreError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Whether the database could not be reached at all, as opposed to a
    /// query that reached it and failed.
    pub const fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Postgres(
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Tls(_)
            )
        )
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        let message = err.to_string();
        if err.is_unavailable() {
            Self::Unavailable { message }
        } else {
            Self::Query { message }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_maps_to_unavailable() {
        let err: StoreError = DbError::Postgres(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }

    #[test]
    fn missing_row_maps_to_query_failure() {
        let err: StoreError = DbError::Postgres(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, StoreError::Query { .. }));
    }

    #[test]
    fn config_errors_are_query_failures() {
        let err: StoreError = DbError::Config(String::from("bad url")).into();
        assert_eq!(
            err,
            StoreError::Query {
                message: String::from("Configuration error: bad url"),
            }
        );
    }
}
