//! Record store error types.

use reliquary_core::FieldType;
use thiserror::Error;

/// Record store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write collided with a declared uniqueness constraint and no
    /// eligible tombstone existed to resurrect. Surfaced unchanged from the
    /// storage engine's own enforcement; never retried.
    #[error("uniqueness conflict: {0}")]
    UniquenessConflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("type mismatch for field '{field}': expected {expected}")]
    TypeMismatch { field: String, expected: FieldType },

    #[error("schema error: {0}")]
    Schema(#[from] reliquary_core::Error),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for record store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    /// Classify driver errors so callers never sniff driver messages.
    ///
    /// SQLite reports UNIQUE violations in two formats:
    /// 1. with columns: `UNIQUE constraint failed: accounts.name`
    /// 2. with index name: `UNIQUE constraint failed: index 'uq_accounts_name'`
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.message().contains("UNIQUE constraint")
        {
            return StoreError::UniquenessConflict(db_err.message().to_string());
        }
        StoreError::Database(err)
    }
}
