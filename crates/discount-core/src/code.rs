use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Symbols a generated code is drawn from.
///
/// `0`, `1`, `I` and `O` are left out since they are easily confused when a
/// code is printed or read aloud. The size divides 256 evenly, so mapping a
/// random byte with `byte % 32` is unbiased.
pub const ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// The lengths a discount code may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeLength {
    Seven,
    Eight,
}

impl CodeLength {
    /// Returns the length in characters.
    pub const fn get(self) -> usize {
        match self {
            CodeLength::Seven => 7,
            CodeLength::Eight => 8,
        }
    }
}

impl TryFrom<usize> for CodeLength {
    type Error = CoreError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            7 => Ok(CodeLength::Seven),
            8 => Ok(CodeLength::Eight),
            other => Err(CoreError::InvalidCodeLength(other)),
        }
    }
}

impl Display for CodeLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}

fn upper_one_to_one(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}

/// A normalized discount code.
///
/// Every code entering the system is trimmed of surrounding whitespace and
/// uppercased before it is used as a key. Normalization alone never fails;
/// operations that act on a single code additionally require a length of
/// 7 or 8 characters via [`Code::parse`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Code(String);

impl Code {
    /// Normalizes raw input without validating its length.
    ///
    /// Lookups use this form: a malformed code simply won't be found.
    ///
    /// Uppercasing maps every character to exactly one character, so the
    /// length never changes. Characters whose uppercase form expands
    /// (`ß` becomes `SS`) are kept as they are.
    pub fn normalize(raw: &str) -> Self {
        Self(raw.trim().chars().map(upper_one_to_one).collect())
    }

    /// Normalizes raw input and checks that it is 7 or 8 characters long.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let code = Self::normalize(raw);
        code.code_length()?;
        Ok(code)
    }

    /// Wraps an already normalized code.
    ///
    /// Use this only for values produced by trusted sources such as the
    /// generator or rows read back from storage.
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters in the code.
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the [`CodeLength`] of this code, or an error naming the 7-or-8
    /// constraint.
    pub fn code_length(&self) -> Result<CodeLength, CoreError> {
        CodeLength::try_from(self.len())
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Code {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(Code::normalize("  abC1234 ").as_str(), "ABC1234");
        assert_eq!(Code::normalize("\tqwerty7\n").as_str(), "QWERTY7");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["  abc1234 ", "XYZ9876", " mIxEd88 ", "", "   ", "ß-straße "] {
            let once = Code::normalize(raw);
            let twice = Code::normalize(once.as_str());
            assert_eq!(once, twice);
            assert_eq!(once.as_str(), once.as_str().trim());
        }
    }

    #[test]
    fn parse_accepts_seven_and_eight() {
        assert_eq!(Code::parse("abc1234").unwrap().code_length().unwrap(), CodeLength::Seven);
        assert_eq!(Code::parse(" abcd1234 ").unwrap().code_length().unwrap(), CodeLength::Eight);
    }

    #[test]
    fn parse_rejects_six_and_nine() {
        for raw in ["ABC123", "ABC123456", "", "   "] {
            let err = Code::parse(raw).unwrap_err();
            assert!(err.to_string().contains("code length must be 7 or 8"));
        }
    }

    #[test]
    fn uppercasing_never_changes_length() {
        let code = Code::normalize("abcdeß");
        assert_eq!(code.as_str(), "ABCDEß");
        assert_eq!(code.len(), 6);

        let err = Code::parse("abcdeß").unwrap_err();
        assert_eq!(err, CoreError::InvalidCodeLength(6));
    }

    #[test]
    fn length_is_measured_after_trimming() {
        let err = Code::parse("  ABC12  ").unwrap_err();
        assert_eq!(err, CoreError::InvalidCodeLength(5));
    }

    #[test]
    fn code_length_try_from() {
        assert_eq!(CodeLength::try_from(7).unwrap().get(), 7);
        assert_eq!(CodeLength::try_from(8).unwrap().get(), 8);
        assert!(CodeLength::try_from(0).is_err());
        assert!(CodeLength::try_from(9).is_err());
    }

    #[test]
    fn alphabet_excludes_ambiguous_symbols() {
        assert_eq!(ALPHABET.len(), 32);
        for ambiguous in [b'0', b'1', b'I', b'O'] {
            assert!(!ALPHABET.contains(&ambiguous));
        }
    }

    #[test]
    fn serializes_as_plain_string() {
        let code = Code::normalize("abc1234");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"ABC1234\"");
    }
}
