//! Settlement repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::{Settlement, SettlementFilter, SettlementStatus};
use crate::domain::DomainResult;
use crate::shared::types::{PaginatedResult, PaginationParams};

#[async_trait]
pub trait SettlementRepository: Send + Sync {
    /// Write-once insert keyed on `payment_id`; a second settlement for the
    /// same payment fails with `AlreadySettled`.
    async fn insert(&self, settlement: Settlement) -> DomainResult<Settlement>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Settlement>>;

    async fn find_by_payment(&self, payment_id: Uuid) -> DomainResult<Option<Settlement>>;

    /// Filtered listing, newest first
    async fn find(
        &self,
        filter: &SettlementFilter,
        page: PaginationParams,
    ) -> DomainResult<PaginatedResult<Settlement>>;

    /// Conditional status write: applies only while the stored status is
    /// still `from` (`Conflict` otherwise). Amounts are never rewritten.
    async fn update_status(
        &self,
        id: Uuid,
        from: SettlementStatus,
        to: SettlementStatus,
        settled_at: Option<DateTime<Utc>>,
    ) -> DomainResult<Settlement>;
}
