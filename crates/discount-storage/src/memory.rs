use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use discount_core::repository::{DiscountCode, ReadRepository, Repository, Result};
use discount_core::{Code, PageQuery, StorageError};
use jiff::Timestamp;

/// In-memory storage entry for a discount code.
#[derive(Debug, Clone)]
struct Entry {
    created_at: Timestamp,
    used: bool,
    used_at: Option<Timestamp>,
}

impl Entry {
    fn into_record(self, code: &str) -> DiscountCode {
        DiscountCode {
            code: Code::new_unchecked(code),
            created_at: self.created_at,
            used: self.used,
            used_at: self.used_at,
        }
    }
}

/// In-memory implementation of the repository contract using DashMap.
///
/// The map key plays the role of the unique constraint. Conditional updates
/// run while holding the shard's write guard, which makes `redeem` atomic
/// with respect to every other operation on the same code.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    storage: DashMap<String, Entry>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self {
            storage: DashMap::new(),
        }
    }

    /// Number of stored codes.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, code: &Code) -> Result<Option<DiscountCode>> {
        Ok(self
            .storage
            .get(code.as_str())
            .map(|entry| entry.value().clone().into_record(entry.key())))
    }

    async fn list(&self, query: &PageQuery) -> Result<(Vec<DiscountCode>, u64)> {
        let mut matching: Vec<DiscountCode> = self
            .storage
            .iter()
            .filter(|entry| !query.only_unused() || !entry.used)
            .map(|entry| entry.value().clone().into_record(entry.key()))
            .collect();

        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.code.cmp(&b.code))
        });

        let total = matching.len() as u64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit()).unwrap_or(usize::MAX);
        let items = matching.into_iter().skip(offset).take(limit).collect();

        Ok((items, total))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert_many(&self, codes: &[Code], created_at: Timestamp) -> Result<u64> {
        let mut inserted = 0;

        for code in codes {
            if let MapEntry::Vacant(slot) = self.storage.entry(code.as_str().to_owned()) {
                slot.insert(Entry {
                    created_at,
                    used: false,
                    used_at: None,
                });
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    async fn insert(&self, record: &DiscountCode) -> Result<()> {
        match self.storage.entry(record.code.as_str().to_owned()) {
            MapEntry::Occupied(_) => Err(StorageError::Conflict(record.code.to_string())),
            MapEntry::Vacant(slot) => {
                slot.insert(Entry {
                    created_at: record.created_at,
                    used: record.used,
                    used_at: record.used_at,
                });
                Ok(())
            }
        }
    }

    async fn set_used(&self, code: &Code, used: bool, at: Timestamp) -> Result<bool> {
        let Some(mut entry) = self.storage.get_mut(code.as_str()) else {
            return Ok(false);
        };

        entry.used = used;
        entry.used_at = used.then_some(at);
        Ok(true)
    }

    async fn delete(&self, code: &Code) -> Result<bool> {
        Ok(self.storage.remove(code.as_str()).is_some())
    }

    async fn redeem(&self, code: &Code, at: Timestamp) -> Result<bool> {
        let Some(mut entry) = self.storage.get_mut(code.as_str()) else {
            return Ok(false);
        };

        if entry.used {
            return Ok(false);
        }

        entry.used = true;
        entry.used_at = Some(at);
        Ok(true)
    }
}
