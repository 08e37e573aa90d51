//! Reservation DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::application::ConversionResult;
use crate::domain::{GuestInfo, Reservation};
use crate::interfaces::http::modules::payments::{CheckoutDto, PaymentDto};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct GuestDto {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
}

impl From<GuestInfo> for GuestDto {
    fn from(g: GuestInfo) -> Self {
        Self {
            name: g.name,
            email: g.email,
            phone: g.phone,
        }
    }
}

impl From<GuestDto> for GuestInfo {
    fn from(g: GuestDto) -> Self {
        Self {
            name: g.name,
            email: g.email,
            phone: g.phone,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReservationRequest {
    /// Defaults to the caller's tenant; required for platform keys
    pub tenant_id: Option<Uuid>,
    pub location_id: Uuid,
    /// Only accepted for `panel` and `api` bookings
    pub storage_id: Option<Uuid>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[validate(nested)]
    pub guest: GuestDto,
    #[validate(range(min = 0))]
    pub amount_minor: i64,
    #[validate(length(equal = 3))]
    pub currency: String,
    /// `widget`, `panel` or `api`. Default: `api`
    pub origin: Option<String>,
    /// Default: true
    pub payment_required: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationDto {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    /// `reserved`, `active`, `completed`, `cancelled` or `no_show`
    pub status: String,
    pub storage_id: Option<Uuid>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub guest: GuestDto,
    pub amount_minor: i64,
    pub currency: String,
    pub origin: String,
    pub payment_required: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Reservation> for ReservationDto {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            tenant_id: r.tenant_id,
            location_id: r.location_id,
            status: r.status.as_str().to_string(),
            storage_id: r.storage_id,
            start_at: r.start_at,
            end_at: r.end_at,
            guest: r.guest.into(),
            amount_minor: r.amount_minor,
            currency: r.currency,
            origin: r.origin.as_str().to_string(),
            payment_required: r.payment_required,
            version: r.version,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Filters for `GET /api/v1/reservations`
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReservationListQuery {
    /// Platform keys only
    pub tenant_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub storage_id: Option<Uuid>,
    pub status: Option<String>,
    pub origin: Option<String>,
    /// Reservations starting at or after this instant
    pub starts_from: Option<DateTime<Utc>>,
    /// Reservations starting before this instant
    pub starts_before: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ConvertRequest {
    /// Auto-selected when omitted
    pub storage_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversionDto {
    pub reservation: ReservationDto,
    pub payment: Option<PaymentDto>,
    pub checkout: Option<CheckoutDto>,
}

impl From<ConversionResult> for ConversionDto {
    fn from(c: ConversionResult) -> Self {
        Self {
            reservation: c.reservation.into(),
            payment: c.payment.map(Into::into),
            checkout: c.checkout.map(Into::into),
        }
    }
}
