//! Shared router state

use std::sync::Arc;
use std::time::Instant;

use sea_orm::DatabaseConnection;

use crate::application::LifecycleEngine;
use crate::interfaces::http::middleware::ApiKeyRegistry;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LifecycleEngine>,
    pub api_keys: Arc<ApiKeyRegistry>,
    /// `None` when running on the in-memory backend
    pub db: Option<DatabaseConnection>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: Arc<LifecycleEngine>, api_keys: ApiKeyRegistry) -> Self {
        Self {
            engine,
            api_keys: Arc::new(api_keys),
            db: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_database(mut self, db: DatabaseConnection) -> Self {
        self.db = Some(db);
        self
    }
}
