//! Settlement calculator
//!
//! Splits every captured payment into the platform commission and the
//! tenant's share, exactly once per payment.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::events::{
    Event, SettlementCreatedEvent, SettlementStatusChangedEvent, SharedEventBus,
};
use crate::domain::{
    split_commission, CommissionRate, CommissionSplit, DomainError, DomainResult, Payment,
    PaymentStatus, RepositoryProvider, Settlement, SettlementFilter, SettlementStatus,
};
use crate::shared::types::{PaginatedResult, PaginationParams};
use crate::shared::utills::KeyedLocks;

pub struct SettlementCalculator {
    repos: Arc<dyn RepositoryProvider>,
    event_bus: SharedEventBus,
    /// Keyed by payment id; serialises settlement creation with the
    /// cancellation that follows a refund
    locks: KeyedLocks<Uuid>,
}

impl SettlementCalculator {
    pub fn new(repos: Arc<dyn RepositoryProvider>, event_bus: SharedEventBus) -> Self {
        Self {
            repos,
            event_bus,
            locks: KeyedLocks::new(),
        }
    }

    /// Pure commission split; `rate` is a percentage in `[0, 100]`.
    pub fn split(total_amount_minor: i64, rate: Decimal) -> DomainResult<CommissionSplit> {
        split_commission(total_amount_minor, CommissionRate::new(rate)?)
    }

    /// Create the settlement for a payment that just became `paid`.
    ///
    /// The payment is re-read first; one that is no longer `paid` (e.g.
    /// refunded since the caller loaded it) is `InvalidState`. The tenant's
    /// commission rate is read now and frozen into the row. A second call
    /// for the same payment fails with `AlreadySettled`.
    pub async fn settle(&self, payment: &Payment) -> DomainResult<Settlement> {
        let _guard = self.locks.lock(&payment.id).await;
        let current = self
            .repos
            .payments()
            .find_by_id(payment.id)
            .await?
            .ok_or_else(|| DomainError::not_found("Payment", payment.id))?;
        let payment = &current;

        let tenant = self
            .repos
            .tenants()
            .find_by_id(payment.tenant_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Tenant", payment.tenant_id))?;

        let settlement = Settlement::for_payment(payment, tenant.commission_rate)?;
        let stored = self.repos.settlements().insert(settlement).await?;
        debug_assert!(stored.is_balanced());

        info!(
            settlement_id = %stored.id,
            payment_id = %stored.payment_id,
            total = stored.total_amount_minor,
            commission = stored.kyradi_commission_minor,
            tenant_share = stored.tenant_settlement_minor,
            rate = %stored.commission_rate,
            currency = %stored.currency,
            "Settlement created"
        );
        metrics::counter!("kyradi_settlements_created_total").increment(1);
        self.locks.prune();
        self.event_bus
            .publish(Event::SettlementCreated(SettlementCreatedEvent {
                settlement_id: stored.id,
                payment_id: stored.payment_id,
                reservation_id: stored.reservation_id,
                tenant_id: stored.tenant_id,
                total_amount_minor: stored.total_amount_minor,
                kyradi_commission_minor: stored.kyradi_commission_minor,
                tenant_settlement_minor: stored.tenant_settlement_minor,
                currency: stored.currency.clone(),
            }));

        Ok(stored)
    }

    /// `settle` for the capture path: a settlement that already exists
    /// counts as success.
    pub async fn ensure_settled(&self, payment: &Payment) -> DomainResult<Settlement> {
        match self.settle(payment).await {
            Ok(settlement) => Ok(settlement),
            Err(DomainError::AlreadySettled { .. }) => {
                debug!(payment_id = %payment.id, "Settlement already exists");
                self.repos
                    .settlements()
                    .find_by_payment(payment.id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("Settlement", payment.id))
            }
            Err(e) => Err(e),
        }
    }

    /// `pending → settled | cancelled`. Repeating the current status is a
    /// no-op; every other edge is `InvalidTransition`.
    pub async fn update_settlement_status(
        &self,
        settlement_id: Uuid,
        to: SettlementStatus,
    ) -> DomainResult<Settlement> {
        let current = self.get(settlement_id).await?;
        let from = current.status;

        let mut next = current.clone();
        let now = Utc::now();
        if !next.transition(to, now)? {
            return Ok(current);
        }

        let stored = self
            .repos
            .settlements()
            .update_status(settlement_id, from, to, next.settled_at)
            .await?;

        info!(%settlement_id, %from, %to, "Settlement status changed");
        self.event_bus
            .publish(Event::SettlementStatusChanged(SettlementStatusChangedEvent {
                settlement_id,
                reservation_id: stored.reservation_id,
                tenant_id: stored.tenant_id,
                from,
                to,
            }));
        Ok(stored)
    }

    /// Called after a refund: a still-pending settlement is cancelled.
    /// An already paid-out settlement is left alone and reported.
    pub async fn cancel_for_refund(&self, payment: &Payment) -> DomainResult<Option<Settlement>> {
        let _guard = self.locks.lock(&payment.id).await;
        let Some(settlement) = self.find_by_payment(payment.id).await? else {
            return Ok(None);
        };
        match settlement.status {
            SettlementStatus::Pending => self
                .update_settlement_status(settlement.id, SettlementStatus::Cancelled)
                .await
                .map(Some),
            SettlementStatus::Settled => {
                warn!(
                    settlement_id = %settlement.id,
                    payment_id = %payment.id,
                    "Refunded payment was already paid out to the tenant"
                );
                Ok(Some(settlement))
            }
            SettlementStatus::Cancelled => Ok(Some(settlement)),
        }
    }

    /// Settle every `paid` payment that has no settlement yet.
    ///
    /// Recovers from a crash between the paid write and the settlement
    /// insert. Returns how many settlements were created.
    pub async fn settle_missing(&self) -> DomainResult<usize> {
        let paid = self.repos.payments().find_by_status(PaymentStatus::Paid).await?;
        let mut created = 0;

        for payment in paid {
            if self.find_by_payment(payment.id).await?.is_some() {
                continue;
            }
            match self.settle(&payment).await {
                Ok(_) => created += 1,
                Err(DomainError::AlreadySettled { .. }) => {}
                // refunded or otherwise moved on since the listing
                Err(DomainError::InvalidState(reason)) => {
                    debug!(payment_id = %payment.id, %reason, "Skipping payment no longer paid")
                }
                Err(e) => {
                    error!(payment_id = %payment.id, error = %e, "Settlement sweep failed for payment")
                }
            }
        }

        if created > 0 {
            info!(count = created, "Settled payments missing a settlement");
        }
        Ok(created)
    }

    pub async fn get(&self, settlement_id: Uuid) -> DomainResult<Settlement> {
        self.repos
            .settlements()
            .find_by_id(settlement_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Settlement", settlement_id))
    }

    pub async fn find_by_payment(&self, payment_id: Uuid) -> DomainResult<Option<Settlement>> {
        self.repos.settlements().find_by_payment(payment_id).await
    }

    pub async fn list(
        &self,
        filter: &SettlementFilter,
        page: PaginationParams,
    ) -> DomainResult<PaginatedResult<Settlement>> {
        self.repos.settlements().find(filter, page).await
    }
}
