//! Settlement DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::domain::Settlement;

#[derive(Debug, Serialize, ToSchema)]
pub struct SettlementDto {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub reservation_id: Uuid,
    pub tenant_id: Uuid,
    pub total_amount_minor: i64,
    pub tenant_settlement_minor: i64,
    pub kyradi_commission_minor: i64,
    /// Percentage applied, as a decimal string (e.g. `"7.5"`)
    pub commission_rate: String,
    pub currency: String,
    /// `pending`, `settled` or `cancelled`
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<Settlement> for SettlementDto {
    fn from(s: Settlement) -> Self {
        Self {
            id: s.id,
            payment_id: s.payment_id,
            reservation_id: s.reservation_id,
            tenant_id: s.tenant_id,
            total_amount_minor: s.total_amount_minor,
            tenant_settlement_minor: s.tenant_settlement_minor,
            kyradi_commission_minor: s.kyradi_commission_minor,
            commission_rate: s.commission_rate.to_string(),
            currency: s.currency,
            status: s.status.as_str().to_string(),
            created_at: s.created_at,
            settled_at: s.settled_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SettlementListQuery {
    /// Platform keys only
    pub tenant_id: Option<Uuid>,
    pub reservation_id: Option<Uuid>,
    pub status: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateSettlementStatusRequest {
    /// `settled` or `cancelled`
    #[validate(length(min = 1, max = 20))]
    pub status: String,
}
