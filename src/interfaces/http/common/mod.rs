//! Shared HTTP building blocks: response envelope, error mapping,
//! validated JSON extractor.

pub mod error;
pub mod response;
pub mod validated_json;

pub use error::{parse_field, ApiError, ApiResult};
pub use response::{ApiResponse, PageQuery, PaginatedResponse};
pub use validated_json::ValidatedJson;
