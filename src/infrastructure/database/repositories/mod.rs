//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

mod common;
pub mod payment_repository;
pub mod repository_provider;
pub mod reservation_repository;
pub mod settlement_repository;
pub mod storage_unit_repository;
pub mod tenant_repository;

pub use repository_provider::SeaOrmRepositoryProvider;
