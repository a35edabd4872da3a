//! # Definition Store Errors

use thiserror::Error;

/// Result type for definition store operations
pub type DefinitionResult<T> = Result<T, DefinitionError>;

/// Definition store errors
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("Definition already exists: {0}")]
    AlreadyExists(String),

    #[error("Middleware is referenced by {0} function(s) and cannot be deleted")]
    MiddlewareInUse(u64),

    #[error("Corrupt definition record: {0}")]
    Corrupt(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<crate::db::DbError> for DefinitionError {
    fn from(e: crate::db::DbError) -> Self {
        DefinitionError::Store(e.to_string())
    }
}
