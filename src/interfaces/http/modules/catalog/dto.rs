//! Tenant, location and storage unit DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::domain::{Location, StorageUnit, Tenant};

#[derive(Debug, Serialize, ToSchema)]
pub struct TenantDto {
    pub id: Uuid,
    pub name: String,
    /// Percentage, as a decimal string (e.g. `"7.5"`)
    pub commission_rate: String,
    pub payment_mode: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Tenant> for TenantDto {
    fn from(t: Tenant) -> Self {
        Self {
            id: t.id,
            name: t.name,
            commission_rate: t.commission_rate.to_string(),
            payment_mode: t.payment_mode.as_str().to_string(),
            currency: t.currency,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTenantRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Percentage in `[0, 100]` as a decimal string
    pub commission_rate: String,
    /// `CASH`, `POS`, `GATEWAY_DEMO` or `GATEWAY_LIVE`
    pub payment_mode: String,
    #[validate(length(equal = 3))]
    pub currency: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateTenantRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub commission_rate: Option<String>,
    pub payment_mode: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LocationDto {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Location> for LocationDto {
    fn from(l: Location) -> Self {
        Self {
            id: l.id,
            tenant_id: l.tenant_id,
            name: l.name,
            created_at: l.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLocationRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StorageUnitDto {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub code: String,
    /// `idle` or `faulty`
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<StorageUnit> for StorageUnitDto {
    fn from(u: StorageUnit) -> Self {
        Self {
            id: u.id,
            tenant_id: u.tenant_id,
            location_id: u.location_id,
            code: u.code,
            status: u.status.as_str().to_string(),
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateStorageUnitRequest {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStorageStatusRequest {
    /// `idle` or `faulty`
    #[validate(length(min = 1, max = 20))]
    pub status: String,
}
