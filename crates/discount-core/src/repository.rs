use crate::code::Code;
use crate::error::StorageError;
use crate::page::PageQuery;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored discount code.
///
/// `used_at` is `None` while the code is unused and holds the redemption
/// instant once it has been used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCode {
    pub code: Code,
    pub created_at: Timestamp,
    pub used: bool,
    pub used_at: Option<Timestamp>,
}

impl DiscountCode {
    /// A fresh, unused code created at `created_at`.
    pub fn unused(code: Code, created_at: Timestamp) -> Self {
        Self {
            code,
            created_at,
            used: false,
            used_at: None,
        }
    }
}

/// Read access to stored codes.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Looks up a code by its exact normalized value.
    /// Returns `None` if the code does not exist.
    async fn get(&self, code: &Code) -> Result<Option<DiscountCode>>;

    /// Returns one page of codes ordered by `created_at` descending, together
    /// with the total number of codes matching the same filter.
    ///
    /// The page and the total are two independent reads; no snapshot is
    /// shared between them.
    async fn list(&self, query: &PageQuery) -> Result<(Vec<DiscountCode>, u64)>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Bulk-inserts unused codes created at `created_at`.
    ///
    /// Codes that already exist are skipped silently; the return value is the
    /// number of rows actually inserted.
    async fn insert_many(&self, codes: &[Code], created_at: Timestamp) -> Result<u64>;

    /// Inserts a single record. Returns `Err(Conflict)` if the code already exists.
    async fn insert(&self, record: &DiscountCode) -> Result<()>;

    /// Unconditionally sets the `used` flag. Setting it stores `at` as
    /// `used_at`, clearing it resets `used_at` to `None`.
    /// Returns `true` if the code existed.
    async fn set_used(&self, code: &Code, used: bool, at: Timestamp) -> Result<bool>;

    /// Deletes a code. Returns `true` if the record existed and was removed.
    async fn delete(&self, code: &Code) -> Result<bool>;

    /// Marks an unused code as used at `at` in one atomic conditional update.
    ///
    /// Returns `true` only for the caller that performed the transition;
    /// missing or already used codes yield `false`.
    async fn redeem(&self, code: &Code, at: Timestamp) -> Result<bool>;
}
