//! Pagination utilities
//!
//! List endpoints accept `page` (1-indexed) and `limit` query parameters and
//! answer with a [`Page`] envelope.

use serde::{Deserialize, Serialize};

/// Page size used when `limit` is absent
pub const DEFAULT_LIMIT: i64 = 20;

/// Largest accepted page size; larger requests are clamped
pub const MAX_LIMIT: i64 = 100;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Rows per page
    pub limit: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// Calculate pagination metadata from total results and requested page
///
/// The page is clamped to `[1, total_pages]` and the limit to
/// `[1, MAX_LIMIT]`.
///
/// # Examples
/// ```
/// use tenx_api::pagination::calculate_pagination;
///
/// // 45 results at 20 per page = 3 pages
/// let p = calculate_pagination(45, 2, 20);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 20);
///
/// // Requesting out-of-bounds page gets clamped
/// let p = calculate_pagination(45, 99, 20);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 40);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64, requested_limit: i64) -> Pagination {
    let limit = requested_limit.clamp(1, MAX_LIMIT);
    let total_pages = (total_results + limit - 1) / limit;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * limit;

    Pagination {
        page,
        limit,
        total_pages,
        offset,
    }
}

/// `page` / `limit` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn resolve(&self, total_results: i64) -> Pagination {
        calculate_pagination(
            total_results,
            self.page.unwrap_or(1),
            self.limit.unwrap_or(DEFAULT_LIMIT),
        )
    }
}

/// Paginated response envelope
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, pagination: Pagination, total: i64) -> Self {
        Self {
            data,
            page: pagination.page,
            limit: pagination.limit,
            total,
            total_pages: pagination.total_pages,
        }
    }
}
