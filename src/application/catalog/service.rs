//! Tenants, locations and storage units
//!
//! Back-office setup the lifecycle services read from. Commission rate and
//! payment mode changes only affect payments and settlements created
//! afterwards.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::domain::money::normalize_currency;
use crate::domain::{
    CommissionRate, DomainError, DomainResult, Location, PaymentMode, RepositoryProvider,
    StorageStatus, StorageUnit, Tenant,
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewTenant {
    pub name: String,
    pub commission_rate: CommissionRate,
    pub payment_mode: PaymentMode,
    pub currency: String,
}

/// Fields left `None` keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantUpdate {
    pub name: Option<String>,
    pub commission_rate: Option<CommissionRate>,
    pub payment_mode: Option<PaymentMode>,
}

pub struct CatalogService {
    repos: Arc<dyn RepositoryProvider>,
}

impl CatalogService {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    pub async fn create_tenant(&self, input: NewTenant) -> DomainResult<Tenant> {
        let name = required("tenant name", &input.name)?;
        let currency = normalize_currency(&input.currency)?;
        let tenant = Tenant::new(name, input.commission_rate, input.payment_mode, currency);
        self.repos.tenants().save(tenant.clone()).await?;

        info!(
            tenant_id = %tenant.id,
            rate = %tenant.commission_rate,
            mode = %tenant.payment_mode,
            "Tenant created"
        );
        Ok(tenant)
    }

    pub async fn update_tenant(&self, tenant_id: Uuid, update: TenantUpdate) -> DomainResult<Tenant> {
        let mut tenant = self.tenant(tenant_id).await?;
        if let Some(name) = update.name {
            tenant.name = required("tenant name", &name)?;
        }
        if let Some(rate) = update.commission_rate {
            info!(%tenant_id, from = %tenant.commission_rate, to = %rate, "Commission rate changed");
            tenant.commission_rate = rate;
        }
        if let Some(mode) = update.payment_mode {
            tenant.payment_mode = mode;
        }
        tenant.updated_at = Utc::now();
        self.repos.tenants().save(tenant.clone()).await?;
        Ok(tenant)
    }

    pub async fn tenant(&self, tenant_id: Uuid) -> DomainResult<Tenant> {
        self.repos
            .tenants()
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Tenant", tenant_id))
    }

    pub async fn list_tenants(&self) -> DomainResult<Vec<Tenant>> {
        self.repos.tenants().find_all().await
    }

    pub async fn create_location(&self, tenant_id: Uuid, name: &str) -> DomainResult<Location> {
        self.tenant(tenant_id).await?;
        let location = Location::new(tenant_id, required("location name", name)?);
        self.repos.locations().save(location.clone()).await?;
        info!(location_id = %location.id, %tenant_id, "Location created");
        Ok(location)
    }

    pub async fn location(&self, location_id: Uuid) -> DomainResult<Location> {
        self.repos
            .locations()
            .find_by_id(location_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Location", location_id))
    }

    pub async fn list_locations(&self, tenant_id: Uuid) -> DomainResult<Vec<Location>> {
        self.repos.locations().find_by_tenant(tenant_id).await
    }

    /// Codes are unique per location
    pub async fn create_storage_unit(&self, location_id: Uuid, code: &str) -> DomainResult<StorageUnit> {
        let location = self.location(location_id).await?;
        let code = required("storage code", code)?;
        let existing = self.repos.storage_units().find_by_location(location_id).await?;
        if existing.iter().any(|u| u.code == code) {
            return Err(DomainError::Conflict(format!(
                "storage code {} already exists at location {}",
                code, location_id
            )));
        }

        let unit = StorageUnit::new(&location, code);
        self.repos.storage_units().save(unit.clone()).await?;
        info!(storage_id = %unit.id, %location_id, code = %unit.code, "Storage unit created");
        Ok(unit)
    }

    pub async fn storage_unit(&self, storage_id: Uuid) -> DomainResult<StorageUnit> {
        self.repos
            .storage_units()
            .find_by_id(storage_id)
            .await?
            .ok_or_else(|| DomainError::not_found("StorageUnit", storage_id))
    }

    /// Taking a unit out of service does not touch reservations already
    /// bound to it; it only stops new assignments.
    pub async fn set_storage_status(
        &self,
        storage_id: Uuid,
        status: StorageStatus,
    ) -> DomainResult<StorageUnit> {
        let mut unit = self.storage_unit(storage_id).await?;
        if unit.status != status {
            info!(%storage_id, from = %unit.status, to = %status, "Storage status changed");
            unit.status = status;
            self.repos.storage_units().save(unit.clone()).await?;
        }
        Ok(unit)
    }

    pub async fn list_storage_units(&self, location_id: Uuid) -> DomainResult<Vec<StorageUnit>> {
        self.repos.storage_units().find_by_location(location_id).await
    }
}

fn required(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}
