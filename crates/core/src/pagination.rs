//! Page/page-size handling for session listings.

use serde::Serialize;

/// Page size used when none (or an out-of-range one) is given.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: i64 = 100;

/// A normalised page request. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// Pages below 1 become 1; page sizes outside `1..=MAX_PAGE_SIZE` fall
    /// back to [`DEFAULT_PAGE_SIZE`] rather than being clamped.
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let page_size = match page_size {
            Some(size) if (1..=MAX_PAGE_SIZE).contains(&size) => size,
            _ => DEFAULT_PAGE_SIZE,
        };
        Self { page, page_size }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// Pagination block returned alongside a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl PageInfo {
    pub fn new(request: PageRequest, total: i64) -> Self {
        Self {
            page: request.page,
            page_size: request.page_size,
            total,
            total_pages: (total + request.page_size - 1) / request.page_size,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
