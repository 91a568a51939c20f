//! Error types for the PostgreSQL store.

use sqlx_core::error::Error as SqlxError;
use tenantforge_store::StoreError;

/// PostgreSQL error code for an undefined schema (3F000).
pub const PG_INVALID_SCHEMA_NAME: &str = "3F000";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Whether the error means the database could not be reached at all.
pub fn is_connectivity(err: &SqlxError) -> bool {
    matches!(
        err,
        SqlxError::Io(_)
            | SqlxError::Tls(_)
            | SqlxError::PoolTimedOut
            | SqlxError::PoolClosed
            | SqlxError::WorkerCrashed
    )
}

/// Errors specific to the PostgreSQL store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Error returned by the driver.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::error::Error),

    /// A stored record could not be encoded or decoded.
    #[error("Record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for StoreError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Database(e) if is_connectivity(&e) => {
                StoreError::unavailable(e.to_string())
            }
            PostgresError::Database(e) => StoreError::internal(e.to_string()),
            PostgresError::Encoding(e) => StoreError::serialization(e.to_string()),
            PostgresError::Config { message } => {
                StoreError::internal(format!("Configuration error: {message}"))
            }
        }
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;
