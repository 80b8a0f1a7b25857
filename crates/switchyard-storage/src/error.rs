//! Storage errors.

use thiserror::Error;

/// Errors raised by the repositories.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database rejected a query or the connection failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row referenced by id does not exist.
    #[error("{entity} #{id} not found")]
    NotFound { entity: &'static str, id: i64 },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
