pub mod error;
pub mod random;
pub mod seq;

pub use error::GeneratorError;
pub use random::RandomGenerator;
pub use seq::SeqGenerator;

use discount_core::Code;

/// Trait for generating discount codes.
///
/// Implementations are pure generators that don't interact with storage and
/// make no promise of uniqueness across calls: collisions are resolved by the
/// caller against the storage uniqueness constraint.
pub trait Generator: Send + Sync + 'static {
    /// Generates one code of exactly `length` characters.
    ///
    /// Fails with [`GeneratorError::InvalidLength`] when `length` is zero.
    fn generate(&self, length: usize) -> Result<Code, GeneratorError>;
}
