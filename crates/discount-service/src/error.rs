use discount_core::{CoreError, StorageError};
use discount_generator::GeneratorError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Cancellation was observed. Codes inserted before that point stay
    /// persisted; `inserted` is zero for single-code operations.
    #[error("operation cancelled after inserting {inserted} codes")]
    Cancelled { inserted: u64 },
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] StorageError),
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
    #[error("code generation failed: {0}")]
    Generator(#[source] GeneratorError),
    #[error("generation worker failed: {0}")]
    Worker(String),
}

impl From<CoreError> for ServiceError {
    fn from(value: CoreError) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}

impl From<StorageError> for ServiceError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Unavailable(_) | StorageError::Timeout(_) => Self::Unavailable(value),
            other => Self::Storage(other),
        }
    }
}

impl From<GeneratorError> for ServiceError {
    fn from(value: GeneratorError) -> Self {
        match value {
            GeneratorError::InvalidLength(_) => Self::InvalidArgument(value.to_string()),
            other => Self::Generator(other),
        }
    }
}
