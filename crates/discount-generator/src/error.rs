use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    #[error("code length must be at least 1, got {0}")]
    InvalidLength(usize),
    #[error("secure random source failed: {0}")]
    Entropy(String),
}
