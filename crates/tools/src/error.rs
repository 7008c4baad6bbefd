//! Tool-facing error kinds (§7), mapped to the `isError` + `details.kind`
//! contract every tool result carries (§6).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("remote transient error: {0}")]
    RemoteTransient(String),
    #[error("extraction failed")]
    ExtractionFailure,
    #[error("cascade failure: {0}")]
    CascadeFailure(String),
}

impl MemoryError {
    pub fn kind(&self) -> &'static str {
        match self {
            MemoryError::NotFound => "not_found",
            MemoryError::Validation(_) => "validation",
            MemoryError::StorageUnavailable(_) => "storage_unavailable",
            MemoryError::RemoteTransient(_) => "remote_transient",
            MemoryError::ExtractionFailure => "extraction_failure",
            MemoryError::CascadeFailure(_) => "cascade_failure",
        }
    }
}

impl From<memsys_store::StoreError> for MemoryError {
    fn from(err: memsys_store::StoreError) -> Self {
        match err {
            memsys_store::StoreError::NotFound => MemoryError::NotFound,
            memsys_store::StoreError::Validation(msg) => MemoryError::Validation(msg),
            memsys_store::StoreError::StorageUnavailable(msg) => MemoryError::StorageUnavailable(msg),
            memsys_store::StoreError::CascadeFailure(msg) => MemoryError::CascadeFailure(msg),
        }
    }
}

impl From<memsys_vector::VectorError> for MemoryError {
    fn from(err: memsys_vector::VectorError) -> Self {
        match err {
            memsys_vector::VectorError::Validation(msg) => MemoryError::Validation(msg),
            memsys_vector::VectorError::StorageUnavailable(msg) => MemoryError::StorageUnavailable(msg),
            memsys_vector::VectorError::RemoteTransient(msg) => MemoryError::RemoteTransient(msg),
        }
    }
}
