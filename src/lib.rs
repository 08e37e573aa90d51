//! # Kyradi booking engine
//!
//! Reservation, payment and settlement lifecycle for hotel luggage storage.
//!
//! ## Architecture
//!
//! - **domain**: entities, state machines, money and repository traits
//! - **application**: ledger, payment gateway, settlement calculator,
//!   conversion service and the [`LifecycleEngine`] facade
//! - **infrastructure**: SeaORM and in-memory repositories, key hashing
//! - **interfaces**: REST API and the dashboard event stream
//! - **server**: runtime wiring and graceful shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use application::{AccessScope, LifecycleEngine};
pub use config::{default_config_path, AppConfig};
pub use infrastructure::{init_database, DatabaseConfig, InMemoryRepositoryProvider, SeaOrmRepositoryProvider};
pub use interfaces::http::create_api_router;
