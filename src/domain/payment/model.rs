//! Payment domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::reservation::Reservation;
use crate::domain::DomainResult;
use crate::shared::errors::DomainError;

/// How the money is collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMode {
    /// Cash at the front desk
    Cash,
    /// Card terminal at the front desk
    Pos,
    /// Hosted checkout against the demo provider
    GatewayDemo,
    /// Hosted checkout against the live provider
    GatewayLive,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Pos => "POS",
            Self::GatewayDemo => "GATEWAY_DEMO",
            Self::GatewayLive => "GATEWAY_LIVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CASH" => Some(Self::Cash),
            "POS" => Some(Self::Pos),
            "GATEWAY_DEMO" => Some(Self::GatewayDemo),
            "GATEWAY_LIVE" => Some(Self::GatewayLive),
            _ => None,
        }
    }

    /// Staff-confirmed modes; no external provider involved
    pub fn is_manual(&self) -> bool {
        matches!(self, Self::Cash | Self::Pos)
    }
}

impl std::fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Authorized,
    Paid,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Authorized => "authorized",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "authorized" => Some(Self::Authorized),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            "refunded" => Some(Self::Refunded),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Money not yet captured
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Authorized)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result reported by a hosted checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutOutcome {
    Success,
    Failed,
}

impl CheckoutOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Payment status this outcome settles into
    pub fn resulting_status(&self) -> PaymentStatus {
        match self {
            Self::Success => PaymentStatus::Paid,
            Self::Failed => PaymentStatus::Failed,
        }
    }
}

/// Where the guest is sent to pay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReference {
    pub session_id: String,
    pub redirect_url: String,
}

/// An earlier checkout attempt, replaced when a failed payment is retried.
///
/// Kept so that provider callbacks redelivered for the old session still
/// resolve to the payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub provider_intent_id: String,
    pub checkout_session_id: Option<String>,
    pub failure_reason: Option<String>,
    pub superseded_at: DateTime<Utc>,
}

/// Payment for a reservation (1:1, created lazily)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub tenant_id: Uuid,
    /// Provider name, e.g. "manual" or "demo"
    pub provider: String,
    pub mode: PaymentMode,
    pub status: PaymentStatus,
    /// Copied from the reservation at creation; never changes
    pub amount_minor: i64,
    pub currency: String,
    /// Idempotency key for every provider call of the current attempt
    pub provider_intent_id: String,
    pub checkout_session_id: Option<String>,
    pub checkout_url: Option<String>,
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    /// Failed attempts before the current one, oldest first
    #[serde(default)]
    pub superseded_attempts: Vec<PaymentAttempt>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn new_intent_key() -> String {
    format!("pi_{}", Uuid::new_v4().simple())
}

impl Payment {
    /// A `pending` intent mirroring the reservation's amount and currency
    pub fn intent_for(reservation: &Reservation, mode: PaymentMode, provider: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            reservation_id: reservation.id,
            tenant_id: reservation.tenant_id,
            provider: provider.into(),
            mode,
            status: PaymentStatus::Pending,
            amount_minor: reservation.amount_minor,
            currency: reservation.currency.clone(),
            provider_intent_id: new_intent_key(),
            checkout_session_id: None,
            checkout_url: None,
            transaction_id: None,
            failure_reason: None,
            paid_at: None,
            refunded_at: None,
            superseded_attempts: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn checkout_reference(&self) -> Option<CheckoutReference> {
        match (&self.checkout_session_id, &self.checkout_url) {
            (Some(session_id), Some(url)) => Some(CheckoutReference {
                session_id: session_id.clone(),
                redirect_url: url.clone(),
            }),
            _ => None,
        }
    }

    /// The superseded attempt a checkout session belongs to
    pub fn superseded_attempt(&self, session_id: &str) -> Option<&PaymentAttempt> {
        self.superseded_attempts
            .iter()
            .find(|a| a.checkout_session_id.as_deref() == Some(session_id))
    }

    fn illegal(&self, action: &str) -> DomainError {
        DomainError::InvalidState(format!(
            "cannot {} payment {} in status {}",
            action, self.id, self.status
        ))
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn attach_checkout(&mut self, reference: &CheckoutReference) -> DomainResult<()> {
        if !self.status.is_open() {
            return Err(self.illegal("open checkout for"));
        }
        self.checkout_session_id = Some(reference.session_id.clone());
        self.checkout_url = Some(reference.redirect_url.clone());
        self.touch();
        Ok(())
    }

    /// pending → authorized
    pub fn mark_authorized(&mut self) -> DomainResult<()> {
        if self.status != PaymentStatus::Pending {
            return Err(self.illegal("authorize"));
        }
        self.status = PaymentStatus::Authorized;
        self.touch();
        Ok(())
    }

    /// pending | authorized → paid
    pub fn mark_paid(&mut self, transaction_id: Option<String>, at: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.is_open() {
            return Err(self.illegal("capture"));
        }
        self.status = PaymentStatus::Paid;
        if transaction_id.is_some() {
            self.transaction_id = transaction_id;
        }
        self.paid_at = Some(at);
        self.failure_reason = None;
        self.touch();
        Ok(())
    }

    /// pending | authorized → failed
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> DomainResult<()> {
        if !self.status.is_open() {
            return Err(self.illegal("fail"));
        }
        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.touch();
        Ok(())
    }

    /// paid → refunded
    pub fn mark_refunded(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status != PaymentStatus::Paid {
            return Err(self.illegal("refund"));
        }
        self.status = PaymentStatus::Refunded;
        self.refunded_at = Some(at);
        self.touch();
        Ok(())
    }

    /// pending | authorized → cancelled
    pub fn cancel(&mut self) -> DomainResult<()> {
        if !self.status.is_open() {
            return Err(self.illegal("cancel"));
        }
        self.status = PaymentStatus::Cancelled;
        self.touch();
        Ok(())
    }

    /// cancelled → paid, for money the provider took after the payment was
    /// cancelled. The caller refunds it.
    pub fn mark_paid_after_cancel(
        &mut self,
        transaction_id: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != PaymentStatus::Cancelled {
            return Err(self.illegal("late-capture"));
        }
        self.status = PaymentStatus::Paid;
        if transaction_id.is_some() {
            self.transaction_id = transaction_id;
        }
        self.paid_at = Some(at);
        self.touch();
        Ok(())
    }

    /// failed → pending with a fresh idempotency key and no checkout session.
    /// The failed attempt is kept in `superseded_attempts`.
    pub fn restart_attempt(&mut self) -> DomainResult<()> {
        if self.status != PaymentStatus::Failed {
            return Err(self.illegal("retry"));
        }
        let now = Utc::now();
        self.superseded_attempts.push(PaymentAttempt {
            provider_intent_id: self.provider_intent_id.clone(),
            checkout_session_id: self.checkout_session_id.clone(),
            failure_reason: self.failure_reason.clone(),
            superseded_at: now,
        });
        self.status = PaymentStatus::Pending;
        self.provider_intent_id = new_intent_key();
        self.checkout_session_id = None;
        self.checkout_url = None;
        self.failure_reason = None;
        self.touch();
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reservation::{GuestInfo, NewReservation, ReservationOrigin};
    use chrono::Duration;

    fn payment(mode: PaymentMode) -> Payment {
        let start = Utc::now();
        let reservation = Reservation::create(NewReservation {
            tenant_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            storage_id: None,
            start_at: start,
            end_at: start + Duration::hours(2),
            guest: GuestInfo {
                name: "Guest".into(),
                email: None,
                phone: None,
            },
            amount_minor: 12_000,
            currency: "TRY".into(),
            origin: ReservationOrigin::Widget,
            payment_required: true,
        })
        .unwrap();
        Payment::intent_for(&reservation, mode, "manual")
    }

    #[test]
    fn intent_copies_reservation_amount() {
        let p = payment(PaymentMode::Cash);
        assert_eq!(p.status, PaymentStatus::Pending);
        assert_eq!(p.amount_minor, 12_000);
        assert_eq!(p.currency, "TRY");
        assert!(p.provider_intent_id.starts_with("pi_"));
    }

    #[test]
    fn paid_then_refunded() {
        let mut p = payment(PaymentMode::Pos);
        p.mark_paid(Some("pos-42".into()), Utc::now()).unwrap();
        assert_eq!(p.status, PaymentStatus::Paid);
        assert!(p.paid_at.is_some());

        p.mark_refunded(Utc::now()).unwrap();
        assert_eq!(p.status, PaymentStatus::Refunded);
        assert!(p.mark_paid(None, Utc::now()).is_err());
        assert!(p.mark_refunded(Utc::now()).is_err());
    }

    #[test]
    fn refund_requires_paid() {
        let mut p = payment(PaymentMode::Cash);
        assert!(matches!(
            p.mark_refunded(Utc::now()),
            Err(DomainError::InvalidState(_))
        ));
        assert_eq!(p.status, PaymentStatus::Pending);
    }

    #[test]
    fn authorized_can_be_captured() {
        let mut p = payment(PaymentMode::GatewayDemo);
        p.mark_authorized().unwrap();
        p.mark_paid(None, Utc::now()).unwrap();
        assert_eq!(p.status, PaymentStatus::Paid);
    }

    #[test]
    fn restart_issues_new_key() {
        let mut p = payment(PaymentMode::GatewayDemo);
        p.attach_checkout(&CheckoutReference {
            session_id: "cs_1".into(),
            redirect_url: "https://pay.example/cs_1".into(),
        })
        .unwrap();
        let first_key = p.provider_intent_id.clone();
        p.mark_failed("card declined").unwrap();

        p.restart_attempt().unwrap();
        assert_eq!(p.status, PaymentStatus::Pending);
        assert_ne!(p.provider_intent_id, first_key);
        assert_eq!(p.checkout_reference(), None);
        assert_eq!(p.failure_reason, None);

        let old = p.superseded_attempt("cs_1").unwrap();
        assert_eq!(old.provider_intent_id, first_key);
        assert_eq!(old.failure_reason.as_deref(), Some("card declined"));
        assert!(p.superseded_attempt("cs_2").is_none());
    }

    #[test]
    fn cancelled_payment_can_only_be_late_captured() {
        let mut p = payment(PaymentMode::GatewayDemo);
        assert!(p.mark_paid_after_cancel(None, Utc::now()).is_err());

        p.cancel().unwrap();
        assert!(p.mark_paid(None, Utc::now()).is_err());
        p.mark_paid_after_cancel(Some("txn_late".into()), Utc::now()).unwrap();
        assert_eq!(p.status, PaymentStatus::Paid);
        assert_eq!(p.transaction_id.as_deref(), Some("txn_late"));
        p.mark_refunded(Utc::now()).unwrap();
    }

    #[test]
    fn mode_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMode::GatewayDemo).unwrap(),
            "\"GATEWAY_DEMO\""
        );
        assert_eq!(PaymentMode::parse("POS"), Some(PaymentMode::Pos));
        assert!(PaymentMode::Cash.is_manual());
        assert!(!PaymentMode::GatewayLive.is_manual());
    }
}
