//! Storage unit & location repository interfaces

use async_trait::async_trait;
use uuid::Uuid;

use super::model::{Location, StorageUnit};
use crate::domain::DomainResult;

#[async_trait]
pub trait StorageUnitRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<StorageUnit>>;

    /// All units at a location, ordered by `code` ascending
    async fn find_by_location(&self, location_id: Uuid) -> DomainResult<Vec<StorageUnit>>;

    async fn save(&self, unit: StorageUnit) -> DomainResult<()>;
}

#[async_trait]
pub trait LocationRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Location>>;

    async fn find_by_tenant(&self, tenant_id: Uuid) -> DomainResult<Vec<Location>>;

    async fn save(&self, location: Location) -> DomainResult<()>;
}
