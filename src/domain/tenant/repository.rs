//! Tenant repository interface

use async_trait::async_trait;
use uuid::Uuid;

use super::model::Tenant;
use crate::domain::DomainResult;

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Tenant>>;

    async fn find_all(&self) -> DomainResult<Vec<Tenant>>;

    /// Insert or replace a tenant (commission rate changes go through here)
    async fn save(&self, tenant: Tenant) -> DomainResult<()>;
}
