//! Payment DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::application::CaptureOutcome;
use crate::domain::{CheckoutReference, Payment};

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentDto {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub tenant_id: Uuid,
    pub provider: String,
    /// `CASH`, `POS`, `GATEWAY_DEMO` or `GATEWAY_LIVE`
    pub mode: String,
    /// `pending`, `authorized`, `paid`, `failed`, `refunded` or `cancelled`
    pub status: String,
    pub amount_minor: i64,
    pub currency: String,
    pub provider_intent_id: String,
    pub checkout_session_id: Option<String>,
    pub checkout_url: Option<String>,
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Payment> for PaymentDto {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            reservation_id: p.reservation_id,
            tenant_id: p.tenant_id,
            provider: p.provider,
            mode: p.mode.as_str().to_string(),
            status: p.status.as_str().to_string(),
            amount_minor: p.amount_minor,
            currency: p.currency,
            provider_intent_id: p.provider_intent_id,
            checkout_session_id: p.checkout_session_id,
            checkout_url: p.checkout_url,
            transaction_id: p.transaction_id,
            failure_reason: p.failure_reason,
            paid_at: p.paid_at,
            refunded_at: p.refunded_at,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Hosted checkout the guest is redirected to
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutDto {
    pub session_id: String,
    pub redirect_url: String,
}

impl From<CheckoutReference> for CheckoutDto {
    fn from(c: CheckoutReference) -> Self {
        Self {
            session_id: c.session_id,
            redirect_url: c.redirect_url,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutSessionResponse {
    pub payment: PaymentDto,
    pub checkout: CheckoutDto,
}

/// Result of a capture: paid right away (manual modes) or a checkout to
/// complete (gateway modes)
#[derive(Debug, Serialize, ToSchema)]
pub struct CaptureResponse {
    /// `paid` or `checkout`
    pub kind: String,
    pub payment: PaymentDto,
    pub checkout: Option<CheckoutDto>,
}

impl From<CaptureOutcome> for CaptureResponse {
    fn from(outcome: CaptureOutcome) -> Self {
        match outcome {
            CaptureOutcome::Paid { payment } => Self {
                kind: "paid".into(),
                payment: payment.into(),
                checkout: None,
            },
            CaptureOutcome::Checkout { payment, checkout } => Self {
                kind: "checkout".into(),
                payment: payment.into(),
                checkout: Some(checkout.into()),
            },
        }
    }
}

/// Provider callback body
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CompleteCheckoutRequest {
    #[validate(length(min = 1, max = 200))]
    pub session_id: String,
    /// `success` or `failed`
    pub outcome: String,
    #[validate(length(max = 200))]
    pub transaction_id: Option<String>,
}
