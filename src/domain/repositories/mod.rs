//! Repository traits for the domain layer
//!
//! Contains:
//! - `RepositoryProvider`: unified access to all per-aggregate repositories
//! - `DomainResult`: standard result type for domain operations

use super::payment::PaymentRepository;
use super::reservation::ReservationRepository;
use super::settlement::SettlementRepository;
use super::storage_unit::{LocationRepository, StorageUnitRepository};
use super::tenant::TenantRepository;
use crate::shared::errors::DomainError;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Provides access to all domain repositories.
///
/// Consumers request only the repository they need:
///
/// ```ignore
/// async fn handle(repos: &dyn RepositoryProvider) {
///     let r = repos.reservations().find_by_id(id).await?;
///     let p = repos.payments().find_by_reservation(id).await?;
/// }
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn tenants(&self) -> &dyn TenantRepository;
    fn locations(&self) -> &dyn LocationRepository;
    fn storage_units(&self) -> &dyn StorageUnitRepository;
    fn reservations(&self) -> &dyn ReservationRepository;
    fn payments(&self) -> &dyn PaymentRepository;
    fn settlements(&self) -> &dyn SettlementRepository;
}
