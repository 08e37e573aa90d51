//! REST API
//!
//! - `common`: response envelope, error mapping, validated JSON
//! - `middleware`: API key authentication
//! - `modules`: handlers and DTOs per resource
//! - `router`: route table and OpenAPI document

pub mod common;
pub mod middleware;
pub mod modules;
pub mod router;
pub mod state;

pub use middleware::{ApiKeyEntry, ApiKeyRegistry, Caller};
pub use router::{create_api_router, ApiDoc};
pub use state::AppState;
