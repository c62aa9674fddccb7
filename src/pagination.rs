//! Shared pagination envelope for list endpoints.

use serde::Serialize;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        Self {
            data,
            total,
            page,
            limit,
            total_pages: total_pages(total, limit),
        }
    }
}

/// Pages below 1 fall back to the first page.
pub fn normalize_page(page: i64) -> i64 {
    if page < 1 {
        DEFAULT_PAGE
    } else {
        page
    }
}

/// Limits outside 1..=100 fall back to the default page size.
pub fn normalize_limit(limit: i64) -> i64 {
    if limit < 1 || limit > MAX_LIMIT {
        DEFAULT_LIMIT
    } else {
        limit
    }
}

pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

/// OFFSET for a 1-based page. Saturates so an absurdly large page number
/// reads as an empty page rather than overflowing the multiplication.
pub fn page_offset(page: i64, limit: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(limit)
}

/// Lenient query-string parsing: junk values fall back to the default
/// instead of failing the request.
pub fn parse_page(raw: Option<&str>) -> i64 {
    normalize_page(raw.and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_PAGE))
}

pub fn parse_limit(raw: Option<&str>) -> i64 {
    normalize_limit(raw.and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_LIMIT))
}
