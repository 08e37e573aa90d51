//! Settlement domain entity
//!
//! One immutable commission split per captured payment. Only the status
//! moves afterwards: `pending → settled` once paid out, or
//! `pending → cancelled` when the payment is refunded first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::{split_commission, CommissionRate};
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::DomainResult;
use crate::shared::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    Settled,
    Cancelled,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Settled => "settled",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "settled" => Some(Self::Settled),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    /// Unique: at most one settlement per payment
    pub payment_id: Uuid,
    pub reservation_id: Uuid,
    pub tenant_id: Uuid,
    pub total_amount_minor: i64,
    pub tenant_settlement_minor: i64,
    pub kyradi_commission_minor: i64,
    /// Tenant's rate at capture time
    pub commission_rate: CommissionRate,
    pub currency: String,
    pub status: SettlementStatus,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Settlement {
    /// Compute the split for a captured payment.
    pub fn for_payment(payment: &Payment, rate: CommissionRate) -> DomainResult<Self> {
        if payment.status != PaymentStatus::Paid {
            return Err(DomainError::InvalidState(format!(
                "payment {} is {}, only paid payments are settled",
                payment.id, payment.status
            )));
        }
        let split = split_commission(payment.amount_minor, rate)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            payment_id: payment.id,
            reservation_id: payment.reservation_id,
            tenant_id: payment.tenant_id,
            total_amount_minor: split.total_amount_minor,
            tenant_settlement_minor: split.tenant_settlement_minor,
            kyradi_commission_minor: split.kyradi_commission_minor,
            commission_rate: rate,
            currency: payment.currency.clone(),
            status: SettlementStatus::Pending,
            created_at: now,
            settled_at: None,
            updated_at: now,
        })
    }

    pub fn is_balanced(&self) -> bool {
        self.tenant_settlement_minor + self.kyradi_commission_minor == self.total_amount_minor
    }

    /// Move to `to`. Returns `false` when already there (no-op).
    pub fn transition(&mut self, to: SettlementStatus, at: DateTime<Utc>) -> DomainResult<bool> {
        if self.status == to {
            return Ok(false);
        }
        if self.status != SettlementStatus::Pending || to == SettlementStatus::Pending {
            return Err(DomainError::InvalidTransition {
                entity: "Settlement",
                from: self.status.to_string(),
                action: match to {
                    SettlementStatus::Pending => "reopen",
                    SettlementStatus::Settled => "settle",
                    SettlementStatus::Cancelled => "cancel",
                },
            });
        }
        self.status = to;
        if to == SettlementStatus::Settled {
            self.settled_at = Some(at);
        }
        self.updated_at = at;
        Ok(true)
    }
}

/// Query filter for listing settlements
#[derive(Debug, Clone, Default)]
pub struct SettlementFilter {
    pub tenant_id: Option<Uuid>,
    pub reservation_id: Option<Uuid>,
    pub status: Option<SettlementStatus>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl SettlementFilter {
    pub fn matches(&self, s: &Settlement) -> bool {
        self.tenant_id.map_or(true, |t| s.tenant_id == t)
            && self.reservation_id.map_or(true, |r| s.reservation_id == r)
            && self.status.map_or(true, |st| s.status == st)
            && self.created_from.map_or(true, |from| s.created_at >= from)
            && self.created_before.map_or(true, |before| s.created_at < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentMode;
    use crate::domain::reservation::{GuestInfo, NewReservation, Reservation, ReservationOrigin};
    use chrono::Duration;

    fn paid_payment(amount_minor: i64) -> Payment {
        let start = Utc::now();
        let reservation = Reservation::create(NewReservation {
            tenant_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            storage_id: None,
            start_at: start,
            end_at: start + Duration::hours(1),
            guest: GuestInfo {
                name: "Guest".into(),
                email: None,
                phone: None,
            },
            amount_minor,
            currency: "TRY".into(),
            origin: ReservationOrigin::Panel,
            payment_required: true,
        })
        .unwrap();
        let mut payment = Payment::intent_for(&reservation, PaymentMode::Cash, "manual");
        payment.mark_paid(None, Utc::now()).unwrap();
        payment
    }

    #[test]
    fn settlement_snapshots_split() {
        let payment = paid_payment(500_000);
        let s = Settlement::for_payment(&payment, "5.0".parse().unwrap()).unwrap();
        assert_eq!(s.kyradi_commission_minor, 25_000);
        assert_eq!(s.tenant_settlement_minor, 475_000);
        assert_eq!(s.status, SettlementStatus::Pending);
        assert!(s.is_balanced());
    }

    #[test]
    fn unpaid_payment_cannot_be_settled() {
        let mut payment = paid_payment(100);
        payment.status = PaymentStatus::Pending;
        assert!(Settlement::for_payment(&payment, CommissionRate::zero()).is_err());
    }

    #[test]
    fn status_moves_only_from_pending() {
        let payment = paid_payment(1_000);
        let mut s = Settlement::for_payment(&payment, CommissionRate::zero()).unwrap();
        let now = Utc::now();

        assert!(s.transition(SettlementStatus::Settled, now).unwrap());
        assert_eq!(s.settled_at, Some(now));
        assert!(!s.transition(SettlementStatus::Settled, now).unwrap());
        assert!(matches!(
            s.transition(SettlementStatus::Cancelled, now),
            Err(DomainError::InvalidTransition { .. })
        ));
        assert!(s.transition(SettlementStatus::Pending, now).is_err());
    }
}
