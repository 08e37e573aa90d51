//! Tenant (hotel) domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::CommissionRate;
use crate::domain::payment::PaymentMode;

/// A hotel using the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    /// Live commission rate. Settlements snapshot it at capture time.
    pub commission_rate: CommissionRate,
    /// Mode used for new payment intents.
    pub payment_mode: PaymentMode,
    /// Default currency for bookings (ISO 4217)
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(
        name: impl Into<String>,
        commission_rate: CommissionRate,
        payment_mode: PaymentMode,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            commission_rate,
            payment_mode,
            currency: currency.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
