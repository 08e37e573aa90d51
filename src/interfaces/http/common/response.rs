//! Response envelope and pagination DTOs

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::shared::types::{PaginatedResult, PaginationParams};

/// Standard API response envelope.
///
/// Success: `{"success": true, "data": {...}}`,
/// failure: `{"success": false, "data": null, "error": "..."}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    /// Payload; `null` on error
    pub data: Option<T>,
    /// Error description; omitted on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// `?page=&limit=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number. Default: 1
    pub page: Option<u32>,
    /// Items per page (1-100). Default: 50
    pub limit: Option<u32>,
}

impl From<PageQuery> for PaginationParams {
    fn from(q: PageQuery) -> Self {
        PaginationParams::new(q.page, q.limit)
    }
}

/// One page of items with paging metadata
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    /// Total items across all pages
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T> {
    /// Map a domain page into DTOs
    pub fn from_result<D>(result: PaginatedResult<D>) -> Self
    where
        T: From<D>,
    {
        Self {
            items: result.items.into_iter().map(T::from).collect(),
            total: result.total,
            page: result.page,
            limit: result.limit,
            total_pages: result.total_pages,
        }
    }
}
