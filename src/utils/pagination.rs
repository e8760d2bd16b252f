use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u64 = 12;
pub const MAX_PAGE_SIZE: u64 = 100;
const MAX_SKIP: u64 = i64::MAX as u64;

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct PaginationQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub limit: u64,
}

impl Page {
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Documents to skip. Capped at what the server accepts (an i64); absurd page
    /// numbers read as empty pages.
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit).min(MAX_SKIP)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

impl From<&PaginationQuery> for Page {
    fn from(q: &PaginationQuery) -> Self {
        Page::new(q.page, q.limit)
    }
}

/// Page metadata attached to every list response.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct PageInfo {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
}

impl PageInfo {
    pub fn new(page: Page, total: u64) -> Self {
        Self {
            total,
            page: page.page,
            limit: page.limit,
            pages: page.total_pages(total),
        }
    }
}
