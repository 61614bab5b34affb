// Shared type definitions
use serde::{Deserialize, Serialize};

// ============================================================================
// Pagination
// ============================================================================

/// Pagination metadata returned alongside every list endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PageMeta {
    #[serde(rename = "totalItems")]
    pub total_items: usize,
    #[serde(rename = "itemsPerPage")]
    pub items_per_page: usize,
    #[serde(rename = "currentPage")]
    pub current_page: usize,
    #[serde(rename = "totalPages")]
    pub total_pages: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

/// Upper bound on `limit`; a request cannot pull a whole collection in one page.
pub const MAX_PAGE_SIZE: usize = 100;

/// Common query parameters accepted by list endpoints. Page numbering is
/// 1-based; out-of-range pages yield an empty item list with truthful meta.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
}

impl ListQuery {
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit_or(&self, default: usize) -> usize {
        self.limit.unwrap_or(default).clamp(1, MAX_PAGE_SIZE)
    }

    /// Trimmed, non-empty search term, if any.
    pub fn term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase())
    }
}

/// Slice an already-filtered collection into one page.
pub fn paginate<T>(items: Vec<T>, page: usize, limit: usize) -> PaginatedResponse<T> {
    let limit = limit.max(1);
    let page = page.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(limit);
    let start = (page - 1).saturating_mul(limit);
    let page_items: Vec<T> = items.into_iter().skip(start).take(limit).collect();
    PaginatedResponse {
        items: page_items,
        meta: PageMeta {
            total_items,
            items_per_page: limit,
            current_page: page,
            total_pages,
        },
    }
}

// ============================================================================
// Health check response
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

// ============================================================================
// Error response
// ============================================================================

/// Uniform error envelope. Every non-2xx body is `{"error": {code, message}}`
/// so the frontend has a single failure shape to parse.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}
