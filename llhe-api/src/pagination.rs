//! Pagination utilities
//!
//! Page numbers are 1-indexed and clamped to `[1, total_pages]`.

use serde::Serialize;

/// Default page size when the client does not ask for one
pub const DEFAULT_LIMIT: i64 = 20;

/// Largest page size a client may request
pub const MAX_LIMIT: i64 = 100;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Page size actually used
    pub limit: i64,
    /// Total number of matching rows
    pub total: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET or slice skipping
    #[serde(skip)]
    pub offset: i64,
}

/// Calculate pagination metadata from total results and the requested page
///
/// # Examples
/// ```
/// use llhe_api::pagination::calculate_pagination;
///
/// // 45 results at 20 per page = 3 pages (20 + 20 + 5)
/// let p = calculate_pagination(45, Some(2), Some(20));
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 20);
///
/// // Requesting out-of-bounds page gets clamped
/// let p = calculate_pagination(45, Some(99), Some(20));
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 40);
/// ```
pub fn calculate_pagination(total: i64, requested_page: Option<i64>, requested_limit: Option<i64>) -> Pagination {
    let limit = requested_limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let total_pages = (total + limit - 1) / limit;
    let page = requested_page.unwrap_or(1).max(1).min(total_pages.max(1));
    let offset = (page - 1) * limit;

    Pagination {
        page,
        limit,
        total,
        total_pages,
        offset,
    }
}

impl Pagination {
    /// Take this page out of an in-memory result set
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}
