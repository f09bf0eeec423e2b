use crate::{Generator, GeneratorError};
use discount_core::{Code, ALPHABET};
use rand::rngs::OsRng;
use rand::TryRngCore;

/// Generates codes from the operating system's secure random source.
///
/// Each character comes from one random byte reduced modulo the alphabet
/// size. The alphabet has 32 symbols and 32 divides 256, so every symbol is
/// equally likely.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomGenerator;

const _: () = assert!(256 % ALPHABET.len() == 0);

impl RandomGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Generator for RandomGenerator {
    fn generate(&self, length: usize) -> Result<Code, GeneratorError> {
        if length == 0 {
            return Err(GeneratorError::InvalidLength(length));
        }

        let mut buffer = vec![0_u8; length];
        OsRng
            .try_fill_bytes(&mut buffer)
            .map_err(|e| GeneratorError::Entropy(e.to_string()))?;

        let code: String = buffer
            .iter()
            .map(|byte| char::from(ALPHABET[usize::from(*byte) % ALPHABET.len()]))
            .collect();

        Ok(Code::new_unchecked(code))
    }
}
