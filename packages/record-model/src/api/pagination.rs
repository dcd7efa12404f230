//! Page arithmetic for `get`

use serde::Serialize;

use super::options::Pagination;
use crate::domain::Row;

/// Result of a `get`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub rows: Vec<Row>,
    /// 1-based, clamped to `1..=total_pages`
    pub current_page: usize,
    /// At least 1, also for an empty result
    pub total_pages: usize,
}

impl Page {
    /// Unpaginated result
    pub fn single(rows: Vec<Row>) -> Self {
        Self {
            rows,
            current_page: 1,
            total_pages: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// LIMIT/OFFSET for one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub current_page: usize,
    pub total_pages: usize,
    pub limit: usize,
    pub offset: usize,
}

impl PageWindow {
    /// `None` when pagination is inert (page size 0)
    pub fn compute(pagination: Pagination, total_rows: usize) -> Option<Self> {
        if pagination.page_size == 0 {
            return None;
        }

        let total_pages = total_rows.div_ceil(pagination.page_size).max(1);
        let current_page = pagination.current_page.clamp(1, total_pages);

        Some(Self {
            current_page,
            total_pages,
            limit: pagination.page_size,
            offset: (current_page - 1) * pagination.page_size,
        })
    }
}
