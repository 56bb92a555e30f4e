//! Page parameters and paginated responses.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// `?page=&per_page=` query parameters. Out-of-range values are clamped
/// rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageParams {
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    #[must_use]
    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    /// SQL `LIMIT`.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page())
    }

    /// SQL `OFFSET`.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * self.limit()
    }
}

/// One page of results with totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    #[must_use]
    pub fn new(items: Vec<T>, params: PageParams, total: i64) -> Self {
        let per_page = i64::from(params.per_page());
        let total = total.max(0);
        Self {
            items,
            page: params.page(),
            per_page: params.per_page(),
            total,
            total_pages: (total + per_page - 1) / per_page,
        }
    }

    /// Transform the items, keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        let p = PageParams::default();
        assert_eq!(p.page(), 1);
        assert_eq!(p.per_page(), 20);
        assert_eq!(p.offset(), 0);

        let p = PageParams {
            page: Some(0),
            per_page: Some(500),
        };
        assert_eq!(p.page(), 1);
        assert_eq!(p.per_page(), 100);
    }

    #[test]
    fn test_offset() {
        let p = PageParams {
            page: Some(3),
            per_page: Some(25),
        };
        assert_eq!(p.offset(), 50);
        assert_eq!(p.limit(), 25);
    }

    #[test]
    fn test_total_pages() {
        let p = PageParams {
            page: Some(1),
            per_page: Some(10),
        };
        assert_eq!(Paginated::new(vec![1], p, 0).total_pages, 0);
        assert_eq!(Paginated::new(vec![1], p, 10).total_pages, 1);
        assert_eq!(Paginated::new(vec![1], p, 11).total_pages, 2);
        assert_eq!(Paginated::new(vec![1, 2], p, 2).map(|n| n * 2).items, vec![2, 4]);
    }
}
