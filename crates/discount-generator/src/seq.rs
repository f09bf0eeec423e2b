use crate::{Generator, GeneratorError};
use discount_core::{Code, ALPHABET};
use std::sync::atomic::{AtomicU64, Ordering};

/// A deterministic generator that encodes a counter in the code alphabet.
///
/// It produces `AAAAAAA`, `AAAAAAB`, ... for length 7. Codes are unique
/// within one instance until the counter wraps the `32^length` space. Meant
/// for fixtures and tests; production code uses [`crate::RandomGenerator`].
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
}

impl SeqGenerator {
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Starts counting from `offset`.
    pub fn with_offset(offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
        }
    }
}

impl Default for SeqGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SeqGenerator {
    fn clone(&self) -> Self {
        Self::with_offset(self.counter.load(Ordering::SeqCst))
    }
}

impl Generator for SeqGenerator {
    fn generate(&self, length: usize) -> Result<Code, GeneratorError> {
        if length == 0 {
            return Err(GeneratorError::InvalidLength(length));
        }

        let mut value = self.counter.fetch_add(1, Ordering::SeqCst);
        let base = ALPHABET.len() as u64;
        let mut symbols = vec![ALPHABET[0]; length];
        for slot in symbols.iter_mut().rev() {
            *slot = ALPHABET[(value % base) as usize];
            value /= base;
        }

        let code = symbols.into_iter().map(char::from).collect::<String>();
        Ok(Code::new_unchecked(code))
    }
}
