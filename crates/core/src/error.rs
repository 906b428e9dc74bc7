//! Error types for schema declarations.

use thiserror::Error;

/// Schema declaration error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("reserved name: {0}")]
    ReservedName(String),

    #[error("duplicate field: {0}")]
    DuplicateField(String),

    #[error("duplicate constraint: {0}")]
    DuplicateConstraint(String),

    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),

    #[error("unknown field '{field}' in {context}")]
    UnknownField { field: String, context: String },

    #[error("empty field set in {0}")]
    EmptyFieldSet(String),

    #[error("entity '{0}' declares no fields")]
    NoFields(String),

    #[error("restore key declared on non-restorable entity '{0}'")]
    NotRestorable(String),
}

/// Result type alias for schema operations.
pub type Result<T> = std::result::Result<T, Error>;
