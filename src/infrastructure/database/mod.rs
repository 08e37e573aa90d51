pub mod entities;
pub mod migrator;
pub mod repositories;

pub use repositories::SeaOrmRepositoryProvider;

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use serde::{Deserialize, Serialize};
use tracing::info;

use migrator::Migrator;

/// `url` value selecting the in-memory backend instead of a database
pub const IN_MEMORY_URL: &str = "memory";

/// Database configuration (`[database]` section)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://./kyradi.db?mode=rwc"), or "memory"
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./kyradi.db?mode=rwc".to_string(),
            max_connections: 8,
        }
    }
}

impl DatabaseConfig {
    /// Create config for SQLite
    pub fn sqlite(path: &str) -> Self {
        Self {
            url: format!("sqlite://{}?mode=rwc", path),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self {
            url: IN_MEMORY_URL.to_string(),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url == IN_MEMORY_URL
    }
}

/// Initialize database connection
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, sea_orm::DbErr> {
    info!(url = %config.url, max_connections = config.max_connections, "Connecting to database");

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections.max(1))
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    let db = Database::connect(options).await?;

    info!("Database connected successfully");
    Ok(db)
}

/// Apply all pending migrations
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), sea_orm::DbErr> {
    info!("Running database migrations");
    Migrator::up(db, None).await?;
    info!("Database migrations complete");
    Ok(())
}
