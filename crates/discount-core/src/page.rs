use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// A normalized offset/limit query over stored codes.
///
/// Construct it with [`PageQuery::new`], which replaces a non-positive page
/// with `1` and a non-positive page size with `50`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    page: u32,
    page_size: u32,
    only_unused: bool,
}

impl PageQuery {
    /// `only_unused` filters to unused codes only when it is `Some(true)`.
    pub fn new(page: i32, page_size: i32, only_unused: Option<bool>) -> Self {
        let page = u32::try_from(page)
            .ok()
            .filter(|page| *page >= 1)
            .unwrap_or(DEFAULT_PAGE);
        let page_size = u32::try_from(page_size)
            .ok()
            .filter(|size| *size >= 1)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        Self {
            page,
            page_size,
            only_unused: only_unused == Some(true),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn only_unused(&self) -> bool {
        self.only_unused
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    /// Maximum number of rows to return.
    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE as i32, None)
    }
}

/// One page of results plus the total number of matching rows.
///
/// `items` and `total` are read separately, so `total` may lag behind
/// concurrent inserts or deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(query: &PageQuery, items: Vec<T>, total: u64) -> Self {
        Self {
            page: query.page(),
            page_size: query.page_size(),
            total,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_values_fall_back_to_defaults() {
        for (page, size) in [(0, 0), (-1, -10), (i32::MIN, 0)] {
            let query = PageQuery::new(page, size, None);
            assert_eq!(query.page(), 1);
            assert_eq!(query.page_size(), 50);
            assert_eq!(query.offset(), 0);
            assert_eq!(query.limit(), 50);
        }
    }

    #[test]
    fn offset_follows_page_and_size() {
        let query = PageQuery::new(3, 20, None);
        assert_eq!(query.offset(), 40);
        assert_eq!(query.limit(), 20);
    }

    #[test]
    fn only_unused_requires_explicit_true() {
        assert!(PageQuery::new(1, 10, Some(true)).only_unused());
        assert!(!PageQuery::new(1, 10, Some(false)).only_unused());
        assert!(!PageQuery::new(1, 10, None).only_unused());
    }

    #[test]
    fn large_pages_do_not_overflow() {
        let query = PageQuery::new(i32::MAX, i32::MAX, None);
        assert_eq!(
            query.offset(),
            (i32::MAX as u64 - 1) * i32::MAX as u64
        );
    }
}
