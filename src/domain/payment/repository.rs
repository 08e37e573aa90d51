//! Payment repository interface

use async_trait::async_trait;
use uuid::Uuid;

use super::model::{Payment, PaymentStatus};
use crate::domain::DomainResult;

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Save a new payment. A second payment for the same reservation, or a
    /// reused `provider_intent_id`, is rejected with `Conflict`.
    async fn insert(&self, payment: Payment) -> DomainResult<Payment>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Payment>>;

    async fn find_by_reservation(&self, reservation_id: Uuid) -> DomainResult<Option<Payment>>;

    /// Matches the current session and the sessions of superseded attempts.
    async fn find_by_checkout_session(&self, session_id: &str) -> DomainResult<Option<Payment>>;

    async fn find_by_status(&self, status: PaymentStatus) -> DomainResult<Vec<Payment>>;

    /// Compare-and-swap on `payment.version`; `Conflict` when stale.
    /// Refunded payments are immutable (`InvalidState`).
    async fn update(&self, payment: Payment) -> DomainResult<Payment>;
}
