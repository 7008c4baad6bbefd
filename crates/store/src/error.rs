use thiserror::Error;

/// Error kinds surfaced by the structured store (§7).
///
/// `NotFound` is not actually returned as an error by most operations — per
/// §4.1/§4.2 a missing slot/entity is `None`/`false`, not a `StoreError`.
/// This variant exists for call sites (e.g. relationship endpoint checks)
/// where absence genuinely needs to be distinguished from other failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("cascade failure: {0}")]
    CascadeFailure(String),
}

impl From<redb::Error> for StoreError {
    fn from(err: redb::Error) -> Self {
        StoreError::StorageUnavailable(err.to_string())
    }
}

impl From<redb::DatabaseError> for StoreError {
    fn from(err: redb::DatabaseError) -> Self {
        StoreError::StorageUnavailable(err.to_string())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(err: redb::TransactionError) -> Self {
        StoreError::StorageUnavailable(err.to_string())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(err: redb::TableError) -> Self {
        StoreError::StorageUnavailable(err.to_string())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(err: redb::StorageError) -> Self {
        StoreError::StorageUnavailable(err.to_string())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(err: redb::CommitError) -> Self {
        StoreError::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::StorageUnavailable(format!("serialisation error: {err}"))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
