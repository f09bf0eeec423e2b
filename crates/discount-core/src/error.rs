use thiserror::Error;

/// Errors raised while validating discount codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("code length must be 7 or 8, got {0}")]
    InvalidCodeLength(usize),
}

/// Errors reported by storage back ends.
///
/// `Conflict` is the only variant callers are expected to recover from: it
/// signals a unique-key violation on a single insert.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("code already exists: {0}")]
    Conflict(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}
