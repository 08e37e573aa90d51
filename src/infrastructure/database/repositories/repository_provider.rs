//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::payment::PaymentRepository;
use crate::domain::repositories::RepositoryProvider;
use crate::domain::reservation::ReservationRepository;
use crate::domain::settlement::SettlementRepository;
use crate::domain::storage_unit::{LocationRepository, StorageUnitRepository};
use crate::domain::tenant::TenantRepository;

use super::payment_repository::SeaOrmPaymentRepository;
use super::reservation_repository::SeaOrmReservationRepository;
use super::settlement_repository::SeaOrmSettlementRepository;
use super::storage_unit_repository::{SeaOrmLocationRepository, SeaOrmStorageUnitRepository};
use super::tenant_repository::SeaOrmTenantRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let r = repos.reservations().find_by_id(id).await?;
/// let s = repos.settlements().find_by_payment(payment_id).await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    tenants: SeaOrmTenantRepository,
    locations: SeaOrmLocationRepository,
    storage_units: SeaOrmStorageUnitRepository,
    reservations: SeaOrmReservationRepository,
    payments: SeaOrmPaymentRepository,
    settlements: SeaOrmSettlementRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            tenants: SeaOrmTenantRepository::new(db.clone()),
            locations: SeaOrmLocationRepository::new(db.clone()),
            storage_units: SeaOrmStorageUnitRepository::new(db.clone()),
            reservations: SeaOrmReservationRepository::new(db.clone()),
            payments: SeaOrmPaymentRepository::new(db.clone()),
            settlements: SeaOrmSettlementRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn tenants(&self) -> &dyn TenantRepository {
        &self.tenants
    }

    fn locations(&self) -> &dyn LocationRepository {
        &self.locations
    }

    fn storage_units(&self) -> &dyn StorageUnitRepository {
        &self.storage_units
    }

    fn reservations(&self) -> &dyn ReservationRepository {
        &self.reservations
    }

    fn payments(&self) -> &dyn PaymentRepository {
        &self.payments
    }

    fn settlements(&self) -> &dyn SettlementRepository {
        &self.settlements
    }
}
