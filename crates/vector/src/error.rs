use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("vector store unavailable: {0}")]
    StorageUnavailable(String),
    #[error("transient vector store error: {0}")]
    RemoteTransient(String),
}

pub type VectorResult<T> = Result<T, VectorError>;
