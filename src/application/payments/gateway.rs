//! Payment gateway adapter
//!
//! Owns the payment state machine for every mode:
//!
//! ```text
//! pending ──► authorized ──► paid ──► refunded
//!    │            │           ▲
//!    ├────────────┴──► failed ──(retry)──► pending
//!    └────────────┴──► cancelled ──(late capture, refunded at once)
//! ```
//!
//! Manual modes (CASH, POS) are confirmed by staff. Gateway modes go
//! through a hosted checkout whose outcome arrives later via
//! `complete_checkout`. Every transition into `paid` triggers the
//! settlement synchronously.
//!
//! Cancelling a gateway payment voids its checkout at the provider. Money
//! the provider still takes afterwards is recorded and refunded.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::provider::{CheckoutProvider, CheckoutRequest, IntentState, ProviderError};
use crate::application::events::{Event, PaymentStatusChangedEvent, SharedEventBus};
use crate::application::settlement::SettlementCalculator;
use crate::domain::{
    CheckoutOutcome, CheckoutReference, DomainError, DomainResult, Payment, PaymentMode,
    PaymentStatus, RepositoryProvider, ReservationStatus,
};
use crate::shared::utills::{retry_with_backoff, KeyedLocks, RetryConfig};

/// Provider name recorded on manual payments
pub const MANUAL_PROVIDER: &str = "manual";

/// Timeout and retry policy for provider calls
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub provider_timeout: Duration,
    pub retry: RetryConfig,
    /// Route GATEWAY_LIVE through the demo provider when no live
    /// provider is installed
    pub allow_demo_for_live: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            allow_demo_for_live: false,
        }
    }
}

/// Result of `capture`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureOutcome {
    /// Money taken (manual modes)
    Paid { payment: Payment },
    /// Guest must finish a hosted checkout
    Checkout {
        payment: Payment,
        checkout: CheckoutReference,
    },
}

impl CaptureOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            CaptureOutcome::Paid { payment } | CaptureOutcome::Checkout { payment, .. } => payment,
        }
    }
}

pub struct PaymentGateway {
    repos: Arc<dyn RepositoryProvider>,
    event_bus: SharedEventBus,
    settlement: Arc<SettlementCalculator>,
    demo_provider: Option<Arc<dyn CheckoutProvider>>,
    live_provider: Option<Arc<dyn CheckoutProvider>>,
    config: GatewayConfig,
    /// Keyed by reservation id (payments are 1:1 with reservations)
    locks: KeyedLocks<Uuid>,
}

impl PaymentGateway {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        event_bus: SharedEventBus,
        settlement: Arc<SettlementCalculator>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            repos,
            event_bus,
            settlement,
            demo_provider: None,
            live_provider: None,
            config,
            locks: KeyedLocks::new(),
        }
    }

    pub fn with_demo_provider(mut self, provider: Arc<dyn CheckoutProvider>) -> Self {
        self.demo_provider = Some(provider);
        self
    }

    pub fn with_live_provider(mut self, provider: Arc<dyn CheckoutProvider>) -> Self {
        self.live_provider = Some(provider);
        self
    }

    /// Create the payment intent for a reservation.
    ///
    /// Idempotent: a reservation has at most one payment, and asking again
    /// returns it unchanged. `mode` defaults to the tenant's configured mode.
    pub async fn create_intent(
        &self,
        reservation_id: Uuid,
        mode: Option<PaymentMode>,
    ) -> DomainResult<Payment> {
        let _guard = self.locks.lock(&reservation_id).await;
        if let Some(existing) = self.repos.payments().find_by_reservation(reservation_id).await? {
            debug!(%reservation_id, payment_id = %existing.id, "Payment intent already exists");
            return Ok(existing);
        }

        let reservation = self
            .repos
            .reservations()
            .find_by_id(reservation_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Reservation", reservation_id))?;
        if reservation.status != ReservationStatus::Active {
            return Err(DomainError::InvalidState(format!(
                "reservation {} is {}, payments are taken for active reservations",
                reservation.id, reservation.status
            )));
        }
        if !reservation.payment_required {
            return Err(DomainError::InvalidState(format!(
                "reservation {} does not require payment",
                reservation.id
            )));
        }

        let mode = match mode {
            Some(mode) => mode,
            None => {
                self.repos
                    .tenants()
                    .find_by_id(reservation.tenant_id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("Tenant", reservation.tenant_id))?
                    .payment_mode
            }
        };
        let provider_name = if mode.is_manual() {
            MANUAL_PROVIDER
        } else {
            self.provider_for(mode)?.name()
        };

        let intent = Payment::intent_for(&reservation, mode, provider_name);
        let stored = match self.repos.payments().insert(intent).await {
            Ok(stored) => stored,
            // another process created it first
            Err(DomainError::Conflict(_)) => self
                .repos
                .payments()
                .find_by_reservation(reservation_id)
                .await?
                .ok_or_else(|| DomainError::not_found("Payment", reservation_id))?,
            Err(e) => return Err(e),
        };

        info!(
            payment_id = %stored.id,
            %reservation_id,
            mode = %stored.mode,
            amount = stored.amount_minor,
            currency = %stored.currency,
            "Payment intent created"
        );
        self.record(&stored, None);
        Ok(stored)
    }

    /// Take the money: manual modes are marked paid, gateway modes get a
    /// hosted checkout reference.
    pub async fn capture(&self, payment_id: Uuid) -> DomainResult<CaptureOutcome> {
        let payment = self.get(payment_id).await?;
        if payment.mode.is_manual() {
            let payment = self.confirm_pos(payment_id).await?;
            Ok(CaptureOutcome::Paid { payment })
        } else {
            let (payment, checkout) = self.create_checkout_session(payment_id).await?;
            Ok(CaptureOutcome::Checkout { payment, checkout })
        }
    }

    /// Staff confirmation of a CASH / POS payment. Already paid is a no-op.
    pub async fn confirm_pos(&self, payment_id: Uuid) -> DomainResult<Payment> {
        let mut payment = self.get(payment_id).await?;
        let _guard = self.locks.lock(&payment.reservation_id).await;
        payment = self.get(payment_id).await?;

        if !payment.mode.is_manual() {
            return Err(DomainError::InvalidState(format!(
                "payment {} is {}; only CASH / POS payments are confirmed by staff",
                payment.id, payment.mode
            )));
        }
        if payment.status == PaymentStatus::Paid {
            return Ok(payment);
        }

        let from = payment.status;
        payment.mark_paid(None, Utc::now())?;
        let stored = self.repos.payments().update(payment).await?;
        self.record(&stored, Some(from));
        self.trigger_settlement(&stored).await;
        Ok(stored)
    }

    /// Open (or return the open) hosted checkout for a gateway payment.
    ///
    /// On a `failed` payment this starts a new attempt with a fresh
    /// idempotency key.
    pub async fn create_checkout_session(
        &self,
        payment_id: Uuid,
    ) -> DomainResult<(Payment, CheckoutReference)> {
        let reservation_id = self.get(payment_id).await?.reservation_id;
        let _guard = self.locks.lock(&reservation_id).await;
        let mut payment = self.get(payment_id).await?;

        if payment.mode.is_manual() {
            return Err(DomainError::InvalidState(format!(
                "payment {} is {}; hosted checkout is only for gateway modes",
                payment.id, payment.mode
            )));
        }
        if payment.status == PaymentStatus::Failed {
            let from = payment.status;
            payment.restart_attempt()?;
            payment = self.repos.payments().update(payment).await?;
            info!(
                %payment_id,
                intent_id = %payment.provider_intent_id,
                "Payment attempt restarted after failure"
            );
            self.record(&payment, Some(from));
        }
        if !payment.status.is_open() {
            return Err(DomainError::InvalidState(format!(
                "payment {} is {}, no checkout can be opened",
                payment.id, payment.status
            )));
        }
        if let Some(reference) = payment.checkout_reference() {
            return Ok((payment, reference));
        }

        let provider = self.provider_for(payment.mode)?;
        let request = CheckoutRequest {
            intent_id: payment.provider_intent_id.clone(),
            payment_id: payment.id,
            reservation_id: payment.reservation_id,
            amount_minor: payment.amount_minor,
            currency: payment.currency.clone(),
        };
        let reference = self
            .call_provider("create_checkout", || {
                let provider = provider.clone();
                let request = request.clone();
                async move { provider.create_checkout(&request).await }
            })
            .await
            .map_err(|e| provider_failure(&payment, "create_checkout", e))?;

        payment.attach_checkout(&reference)?;
        let stored = self.repos.payments().update(payment).await?;
        info!(
            %payment_id,
            session_id = %reference.session_id,
            "Checkout session opened"
        );
        Ok((stored, reference))
    }

    /// Apply the hosted checkout's terminal outcome (provider callback).
    ///
    /// Repeating the recorded outcome is a no-op; a different outcome for
    /// an already terminal payment is `Conflict`. Sessions of superseded
    /// attempts still resolve. A success on a cancelled payment is checked
    /// with the provider and, if real, refunded.
    pub async fn complete_checkout(
        &self,
        session_id: &str,
        outcome: CheckoutOutcome,
        transaction_id: Option<String>,
    ) -> DomainResult<Payment> {
        let reservation_id = self
            .repos
            .payments()
            .find_by_checkout_session(session_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "Payment",
                field: "checkout_session_id",
                value: session_id.to_string(),
            })?
            .reservation_id;
        let _guard = self.locks.lock(&reservation_id).await;
        let mut payment = self
            .repos
            .payments()
            .find_by_checkout_session(session_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "Payment",
                field: "checkout_session_id",
                value: session_id.to_string(),
            })?;

        if payment.checkout_session_id.as_deref() != Some(session_id) {
            return self.complete_superseded(payment, session_id, outcome).await;
        }

        if payment.status == PaymentStatus::Cancelled {
            if outcome == CheckoutOutcome::Failed {
                debug!(payment_id = %payment.id, session_id, "Checkout failed on a cancelled payment");
                return Ok(payment);
            }
            // confirm with the provider before recording money on a cancelled payment
            let intent_id = payment.provider_intent_id.clone();
            return match self.lookup_intent(&payment, &intent_id).await? {
                IntentState::Paid {
                    transaction_id: provider_txn,
                } => self.late_capture(payment, provider_txn.or(transaction_id)).await,
                state => {
                    debug!(payment_id = %payment.id, ?state, "No capture behind success callback");
                    Ok(payment)
                }
            };
        }

        if !payment.status.is_open() {
            let repeated = payment.status == outcome.resulting_status()
                || (payment.status == PaymentStatus::Refunded
                    && outcome == CheckoutOutcome::Success);
            if repeated {
                debug!(payment_id = %payment.id, session_id, "Checkout outcome already applied");
                if payment.status == PaymentStatus::Paid {
                    self.trigger_settlement(&payment).await;
                }
                return Ok(payment);
            }
            return Err(DomainError::Conflict(format!(
                "payment {} is already {}, cannot apply checkout outcome {:?}",
                payment.id, payment.status, outcome
            )));
        }

        let from = payment.status;
        match outcome {
            CheckoutOutcome::Success => payment.mark_paid(transaction_id, Utc::now())?,
            CheckoutOutcome::Failed => payment.mark_failed("checkout failed")?,
        }
        let stored = self.repos.payments().update(payment).await?;
        self.record(&stored, Some(from));
        if stored.status == PaymentStatus::Paid {
            self.trigger_settlement(&stored).await;
        }
        Ok(stored)
    }

    /// Refund a paid payment in full.
    ///
    /// A provider failure leaves the payment `paid` and is surfaced as a
    /// `Provider` error requiring reconciliation.
    pub async fn refund(&self, payment_id: Uuid) -> DomainResult<Payment> {
        let reservation_id = self.get(payment_id).await?.reservation_id;
        let _guard = self.locks.lock(&reservation_id).await;
        let payment = self.get(payment_id).await?;

        match payment.status {
            PaymentStatus::Refunded => Ok(payment),
            PaymentStatus::Paid => self.refund_paid(payment).await,
            other => Err(DomainError::InvalidState(format!(
                "payment {} is {}, only paid payments can be refunded",
                payment.id, other
            ))),
        }
    }

    /// Ask the provider what happened to the current intent and apply it.
    ///
    /// The required step after a provider timeout. On a cancelled payment
    /// it also voids a checkout that is still open and refunds money taken
    /// after the cancellation.
    pub async fn reconcile(&self, payment_id: Uuid) -> DomainResult<Payment> {
        let reservation_id = self.get(payment_id).await?.reservation_id;
        let _guard = self.locks.lock(&reservation_id).await;
        let mut payment = self.get(payment_id).await?;

        if payment.mode.is_manual() {
            return Ok(payment);
        }

        let intent_id = payment.provider_intent_id.clone();
        let state = self.lookup_intent(&payment, &intent_id).await?;

        let from = payment.status;
        match (&state, from) {
            (IntentState::Paid { transaction_id }, PaymentStatus::Cancelled) => {
                return self.late_capture(payment, transaction_id.clone()).await;
            }
            (IntentState::Open | IntentState::Authorized, PaymentStatus::Cancelled) => {
                return match self.void_checkout(&payment).await? {
                    IntentState::Paid { transaction_id } => {
                        self.late_capture(payment, transaction_id).await
                    }
                    _ => Ok(payment),
                };
            }
            (IntentState::Paid { transaction_id }, s) if s.is_open() => {
                payment.mark_paid(transaction_id.clone(), Utc::now())?;
            }
            (IntentState::Authorized, PaymentStatus::Pending) => {
                payment.mark_authorized()?;
            }
            (IntentState::Failed { reason }, s) if s.is_open() => {
                payment.mark_failed(reason.clone())?;
            }
            (IntentState::Voided, s) if s.is_open() => {
                payment.mark_failed("checkout voided at provider")?;
            }
            (IntentState::Refunded, PaymentStatus::Paid) => {
                payment.mark_refunded(Utc::now())?;
            }
            (IntentState::Paid { .. }, PaymentStatus::Paid) => {
                self.trigger_settlement(&payment).await;
                return Ok(payment);
            }
            (IntentState::Open | IntentState::Authorized | IntentState::Unknown, _) => {
                debug!(%payment_id, ?state, "Nothing to reconcile");
                return Ok(payment);
            }
            (IntentState::Failed { .. } | IntentState::Voided, PaymentStatus::Cancelled)
            | (IntentState::Failed { .. } | IntentState::Voided, PaymentStatus::Failed)
            | (IntentState::Refunded, PaymentStatus::Refunded) => return Ok(payment),
            _ => {
                warn!(%payment_id, status = %from, ?state, "Provider state disagrees with payment");
                return Err(DomainError::Conflict(format!(
                    "provider reports {:?} for payment {} which is {}",
                    state, payment_id, from
                )));
            }
        }

        let stored = self.repos.payments().update(payment).await?;
        info!(%payment_id, %from, to = %stored.status, "Payment reconciled");
        self.record(&stored, Some(from));
        match stored.status {
            PaymentStatus::Paid => self.trigger_settlement(&stored).await,
            PaymentStatus::Refunded => {
                if let Err(e) = self.settlement.cancel_for_refund(&stored).await {
                    error!(%payment_id, error = %e, "Failed to cancel settlement after refund");
                }
            }
            _ => {}
        }
        Ok(stored)
    }

    /// Cancel the open payment of a cancelled reservation.
    ///
    /// Gateway checkouts are voided at the provider first. If the guest
    /// already paid, the payment is recorded as `paid` instead. A paid
    /// payment is left alone; it needs an explicit refund.
    pub async fn cancel_for_reservation(&self, reservation_id: Uuid) -> DomainResult<Option<Payment>> {
        let _guard = self.locks.lock(&reservation_id).await;
        let Some(mut payment) = self.repos.payments().find_by_reservation(reservation_id).await?
        else {
            return Ok(None);
        };

        if !payment.status.is_open() {
            if payment.status == PaymentStatus::Paid {
                warn!(
                    payment_id = %payment.id,
                    %reservation_id,
                    "Reservation cancelled with a paid payment; refund required"
                );
            }
            return Ok(Some(payment));
        }

        if !payment.mode.is_manual() {
            match self.void_checkout(&payment).await {
                Ok(IntentState::Paid { transaction_id }) => {
                    let from = payment.status;
                    payment.mark_paid(transaction_id, Utc::now())?;
                    let stored = self.repos.payments().update(payment).await?;
                    self.record(&stored, Some(from));
                    self.trigger_settlement(&stored).await;
                    warn!(
                        payment_id = %stored.id,
                        %reservation_id,
                        "Guest paid before the reservation was cancelled; refund required"
                    );
                    return Ok(Some(stored));
                }
                Ok(_) => {}
                Err(e) => warn!(
                    payment_id = %payment.id,
                    error = %e,
                    "Checkout not voided at provider; a later capture will be refunded"
                ),
            }
        }

        let from = payment.status;
        payment.cancel()?;
        let stored = self.repos.payments().update(payment).await?;
        self.record(&stored, Some(from));
        Ok(Some(stored))
    }

    pub async fn get(&self, payment_id: Uuid) -> DomainResult<Payment> {
        self.repos
            .payments()
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Payment", payment_id))
    }

    pub async fn find_by_reservation(&self, reservation_id: Uuid) -> DomainResult<Option<Payment>> {
        self.repos.payments().find_by_reservation(reservation_id).await
    }

    // ── internals ───────────────────────────────────────────────

    /// Refund a `paid` payment. Caller holds the reservation lock.
    async fn refund_paid(&self, mut payment: Payment) -> DomainResult<Payment> {
        let payment_id = payment.id;
        if !payment.mode.is_manual() {
            let intent_id = payment.provider_intent_id.clone();
            self.refund_intent(&payment, &intent_id).await.map_err(|e| {
                error!(%payment_id, error = %e, "Refund failed at provider; payment stays paid");
                e
            })?;
        }

        let from = payment.status;
        payment.mark_refunded(Utc::now())?;
        let stored = self.repos.payments().update(payment).await?;
        self.record(&stored, Some(from));

        if let Err(e) = self.settlement.cancel_for_refund(&stored).await {
            error!(%payment_id, error = %e, "Failed to cancel settlement after refund");
        }
        Ok(stored)
    }

    /// Money taken on a cancelled payment: record it as paid, then return it.
    async fn late_capture(
        &self,
        mut payment: Payment,
        transaction_id: Option<String>,
    ) -> DomainResult<Payment> {
        warn!(
            payment_id = %payment.id,
            reservation_id = %payment.reservation_id,
            "Capture arrived after the payment was cancelled; refunding"
        );
        let from = payment.status;
        payment.mark_paid_after_cancel(transaction_id, Utc::now())?;
        let paid = self.repos.payments().update(payment).await?;
        self.record(&paid, Some(from));
        self.trigger_settlement(&paid).await;
        self.refund_paid(paid).await
    }

    /// Callback for a session of an attempt replaced by a retry.
    ///
    /// That attempt is recorded as failed, so a repeated failure is a no-op.
    /// A success the provider confirms is refunded on the old intent; the
    /// current attempt is left as it is.
    async fn complete_superseded(
        &self,
        payment: Payment,
        session_id: &str,
        outcome: CheckoutOutcome,
    ) -> DomainResult<Payment> {
        let Some(attempt) = payment.superseded_attempt(session_id).cloned() else {
            return Err(DomainError::NotFound {
                entity: "Payment",
                field: "checkout_session_id",
                value: session_id.to_string(),
            });
        };
        if outcome == CheckoutOutcome::Failed {
            debug!(payment_id = %payment.id, session_id, "Outcome of superseded attempt already applied");
            return Ok(payment);
        }

        let state = self.lookup_intent(&payment, &attempt.provider_intent_id).await?;
        match state {
            IntentState::Paid { .. } => {
                warn!(
                    payment_id = %payment.id,
                    intent_id = %attempt.provider_intent_id,
                    "Superseded attempt was paid; refunding it"
                );
                self.refund_intent(&payment, &attempt.provider_intent_id).await?;
            }
            IntentState::Refunded => {}
            state => {
                debug!(payment_id = %payment.id, ?state, "No capture behind superseded success callback")
            }
        }
        Ok(payment)
    }

    async fn lookup_intent(&self, payment: &Payment, intent_id: &str) -> DomainResult<IntentState> {
        let provider = self.provider_for(payment.mode)?;
        self.call_provider("lookup", || {
            let provider = provider.clone();
            let intent_id = intent_id.to_string();
            async move { provider.lookup(&intent_id).await }
        })
        .await
        .map_err(|e| provider_failure(payment, "lookup", e))
    }

    /// Full refund of one intent. Any provider failure needs reconciliation.
    async fn refund_intent(&self, payment: &Payment, intent_id: &str) -> DomainResult<()> {
        let provider = self.provider_for(payment.mode)?;
        let amount = payment.amount_minor;
        self.call_provider("refund", || {
            let provider = provider.clone();
            let intent_id = intent_id.to_string();
            async move { provider.refund(&intent_id, amount).await }
        })
        .await
        .map_err(|e| DomainError::Provider {
            message: format!("refund of payment {} failed: {}", payment.id, e),
            reconciliation_required: true,
        })
    }

    async fn void_checkout(&self, payment: &Payment) -> DomainResult<IntentState> {
        let provider = self.provider_for(payment.mode)?;
        let intent_id = payment.provider_intent_id.clone();
        self.call_provider("cancel", || {
            let provider = provider.clone();
            let intent_id = intent_id.clone();
            async move { provider.cancel(&intent_id).await }
        })
        .await
        .map_err(|e| provider_failure(payment, "cancel", e))
    }

    fn provider_for(&self, mode: PaymentMode) -> DomainResult<Arc<dyn CheckoutProvider>> {
        let provider = match mode {
            PaymentMode::GatewayDemo => self.demo_provider.clone(),
            PaymentMode::GatewayLive => self.live_provider.clone().or_else(|| {
                self.config
                    .allow_demo_for_live
                    .then(|| self.demo_provider.clone())
                    .flatten()
            }),
            PaymentMode::Cash | PaymentMode::Pos => None,
        };
        provider.ok_or_else(|| {
            DomainError::InvalidState(format!("no checkout provider configured for {}", mode))
        })
    }

    /// One provider call under the configured timeout, retried with backoff
    /// on transient failures. Timeouts are not retried.
    async fn call_provider<T, F, Fut>(
        &self,
        operation: &'static str,
        call: F,
    ) -> Result<T, ProviderError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        let timeout = self.config.provider_timeout;
        let result = retry_with_backoff(
            &self.config.retry,
            || {
                let attempt = call();
                async move {
                    match tokio::time::timeout(timeout, attempt).await {
                        Ok(result) => result,
                        Err(_) => Err(ProviderError::Timeout(timeout)),
                    }
                }
            },
            ProviderError::is_transient,
            operation,
        )
        .await;

        let label = match &result {
            Ok(_) => "ok",
            Err(ProviderError::Timeout(_)) => "timeout",
            Err(ProviderError::Transient(_)) => "transient",
            Err(ProviderError::Rejected(_)) => "rejected",
        };
        metrics::counter!(
            "kyradi_provider_calls_total",
            "operation" => operation,
            "result" => label
        )
        .increment(1);
        result
    }

    async fn trigger_settlement(&self, payment: &Payment) {
        match self.settlement.ensure_settled(payment).await {
            Ok(_) => {}
            // the sweeper picks up paid payments without a settlement
            Err(e) if e.is_transient() => {
                warn!(payment_id = %payment.id, error = %e, "Settlement deferred to sweeper")
            }
            Err(e) => error!(payment_id = %payment.id, error = %e, "Settlement after capture failed"),
        }
    }

    fn record(&self, payment: &Payment, from: Option<PaymentStatus>) {
        info!(
            payment_id = %payment.id,
            reservation_id = %payment.reservation_id,
            from = ?from,
            to = %payment.status,
            "Payment transition"
        );
        metrics::counter!(
            "kyradi_payments_total",
            "mode" => payment.mode.as_str(),
            "status" => payment.status.as_str()
        )
        .increment(1);
        self.event_bus
            .publish(Event::PaymentStatusChanged(PaymentStatusChangedEvent {
                payment_id: payment.id,
                reservation_id: payment.reservation_id,
                tenant_id: payment.tenant_id,
                mode: payment.mode,
                from,
                to: payment.status,
            }));
        self.locks.prune();
    }
}

fn provider_failure(payment: &Payment, operation: &str, e: ProviderError) -> DomainError {
    let reconciliation_required = !matches!(e, ProviderError::Rejected(_));
    warn!(
        payment_id = %payment.id,
        operation,
        error = %e,
        reconciliation_required,
        "Provider call failed"
    );
    DomainError::Provider {
        message: format!("{} for payment {} failed: {}", operation, payment.id, e),
        reconciliation_required,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::payments::provider::{operation, DemoFault};
    use crate::application::testing::Fixture;
    use crate::application::AccessScope;
    use crate::domain::SettlementStatus;

    /// Active GATEWAY_DEMO reservation with an open checkout
    async fn open_checkout(fx: &Fixture) -> (Payment, CheckoutReference) {
        let r = fx.active_reservation(1, 2).await;
        let intent = fx.gateway.create_intent(r.id, None).await.unwrap();
        fx.gateway.create_checkout_session(intent.id).await.unwrap()
    }

    #[tokio::test]
    async fn create_intent_is_one_per_reservation() {
        let fx = Fixture::new(&["A-01"]).await;
        let r = fx.active_reservation(1, 2).await;
        let a = fx.gateway.create_intent(r.id, None).await.unwrap();
        let b = fx.gateway.create_intent(r.id, Some(PaymentMode::Pos)).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.mode, PaymentMode::Cash);
        assert_eq!(a.status, PaymentStatus::Pending);
        assert_eq!(a.amount_minor, r.amount_minor);
        assert!(a.provider_intent_id.starts_with("pi_"));
    }

    #[tokio::test]
    async fn create_intent_requires_active_reservation() {
        let fx = Fixture::new(&["A-01"]).await;
        let r = fx.reserve(1, 2).await;
        assert!(matches!(
            fx.gateway.create_intent(r.id, None).await,
            Err(DomainError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn pos_confirmation_pays_and_settles_once() {
        let fx = Fixture::with_rate("7.5", PaymentMode::Pos, &["A-01"]).await;
        let r = fx.active_reservation(1, 2).await;
        let intent = fx.gateway.create_intent(r.id, None).await.unwrap();

        let paid = fx.gateway.confirm_pos(intent.id).await.unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);
        assert!(paid.paid_at.is_some());
        let again = fx.gateway.confirm_pos(intent.id).await.unwrap();
        assert_eq!(again.version, paid.version);

        let settlement = fx.settlement.find_by_payment(paid.id).await.unwrap().unwrap();
        assert_eq!(settlement.kyradi_commission_minor, 37_500);
        assert_eq!(settlement.tenant_settlement_minor, 462_500);
    }

    #[tokio::test]
    async fn gateway_checkout_reference_is_stable() {
        let fx = Fixture::new_gateway(&["A-01"]).await;
        let r = fx.active_reservation(1, 2).await;
        let intent = fx.gateway.create_intent(r.id, None).await.unwrap();
        assert_eq!(intent.provider, "demo");

        let first = fx.gateway.capture(intent.id).await.unwrap();
        let second = fx.gateway.capture(intent.id).await.unwrap();
        match (first, second) {
            (
                CaptureOutcome::Checkout { checkout: a, .. },
                CaptureOutcome::Checkout { checkout: b, payment },
            ) => {
                assert_eq!(a, b);
                assert_eq!(payment.status, PaymentStatus::Pending);
            }
            other => panic!("expected checkout references, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn complete_checkout_success_then_conflicting_failure() {
        let fx = Fixture::new_gateway(&["A-01"]).await;
        let r = fx.active_reservation(1, 2).await;
        let intent = fx.gateway.create_intent(r.id, None).await.unwrap();
        let (_, checkout) = fx.gateway.create_checkout_session(intent.id).await.unwrap();

        let paid = fx
            .gateway
            .complete_checkout(&checkout.session_id, CheckoutOutcome::Success, Some("txn_1".into()))
            .await
            .unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);
        assert_eq!(paid.transaction_id.as_deref(), Some("txn_1"));

        let repeat = fx
            .gateway
            .complete_checkout(&checkout.session_id, CheckoutOutcome::Success, None)
            .await
            .unwrap();
        assert_eq!(repeat.version, paid.version);

        assert!(matches!(
            fx.gateway
                .complete_checkout(&checkout.session_id, CheckoutOutcome::Failed, None)
                .await,
            Err(DomainError::Conflict(_))
        ));
        assert!(fx.settlement.find_by_payment(paid.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_checkout_has_no_settlement_and_retry_uses_new_key() {
        let fx = Fixture::new_gateway(&["A-01"]).await;
        let r = fx.active_reservation(1, 2).await;
        let intent = fx.gateway.create_intent(r.id, None).await.unwrap();
        let (_, checkout) = fx.gateway.create_checkout_session(intent.id).await.unwrap();

        let failed = fx
            .gateway
            .complete_checkout(&checkout.session_id, CheckoutOutcome::Failed, None)
            .await
            .unwrap();
        assert_eq!(failed.status, PaymentStatus::Failed);
        assert!(fx.settlement.find_by_payment(failed.id).await.unwrap().is_none());

        let (retried, new_checkout) = fx.gateway.create_checkout_session(intent.id).await.unwrap();
        assert_eq!(retried.status, PaymentStatus::Pending);
        assert_ne!(retried.provider_intent_id, intent.provider_intent_id);
        assert_ne!(new_checkout.session_id, checkout.session_id);
    }

    #[tokio::test]
    async fn provider_timeout_keeps_payment_pending_and_flags_reconciliation() {
        let fx = Fixture::new_gateway(&["A-01"]).await;
        let r = fx.active_reservation(1, 2).await;
        let intent = fx.gateway.create_intent(r.id, None).await.unwrap();

        fx.demo.inject_fault(operation::CREATE_CHECKOUT, DemoFault::Hang);
        let err = fx.gateway.create_checkout_session(intent.id).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Provider {
                reconciliation_required: true,
                ..
            }
        ));
        let current = fx.gateway.get(intent.id).await.unwrap();
        assert_eq!(current.status, PaymentStatus::Pending);
        assert!(current.checkout_session_id.is_none());
    }

    #[tokio::test]
    async fn transient_provider_errors_are_retried() {
        let fx = Fixture::new_gateway(&["A-01"]).await;
        let r = fx.active_reservation(1, 2).await;
        let intent = fx.gateway.create_intent(r.id, None).await.unwrap();

        fx.demo.inject_fault(operation::CREATE_CHECKOUT, DemoFault::Transient);
        fx.demo.inject_fault(operation::CREATE_CHECKOUT, DemoFault::Transient);
        let (payment, _) = fx.gateway.create_checkout_session(intent.id).await.unwrap();
        assert!(payment.checkout_session_id.is_some());
    }

    #[tokio::test]
    async fn refund_cancels_pending_settlement() {
        let fx = Fixture::new(&["A-01"]).await;
        let r = fx.active_reservation(1, 2).await;
        let intent = fx.gateway.create_intent(r.id, None).await.unwrap();
        fx.gateway.confirm_pos(intent.id).await.unwrap();

        let refunded = fx.gateway.refund(intent.id).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
        let again = fx.gateway.refund(intent.id).await.unwrap();
        assert_eq!(again.refunded_at, refunded.refunded_at);

        let settlement = fx.settlement.find_by_payment(intent.id).await.unwrap().unwrap();
        assert_eq!(settlement.status, SettlementStatus::Cancelled);
    }

    #[tokio::test]
    async fn refund_of_unpaid_payment_is_invalid_state() {
        let fx = Fixture::new(&["A-01"]).await;
        let r = fx.active_reservation(1, 2).await;
        let intent = fx.gateway.create_intent(r.id, None).await.unwrap();
        assert!(matches!(
            fx.gateway.refund(intent.id).await,
            Err(DomainError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn failed_provider_refund_leaves_payment_paid() {
        let fx = Fixture::new_gateway(&["A-01"]).await;
        let paid = fx.paid_gateway_payment(1, 2).await;

        fx.demo
            .inject_fault(operation::REFUND, DemoFault::Reject("bank unavailable".into()));
        let err = fx.gateway.refund(paid.id).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Provider {
                reconciliation_required: true,
                ..
            }
        ));
        assert_eq!(fx.gateway.get(paid.id).await.unwrap().status, PaymentStatus::Paid);

        let refunded = fx.gateway.refund(paid.id).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn reconcile_applies_provider_outcome_after_missed_callback() {
        let fx = Fixture::new_gateway(&["A-01"]).await;
        let r = fx.active_reservation(1, 2).await;
        let intent = fx.gateway.create_intent(r.id, None).await.unwrap();
        let (_, checkout) = fx.gateway.create_checkout_session(intent.id).await.unwrap();

        // guest paid, but the callback never arrived
        fx.demo
            .finish_checkout(&checkout.session_id, CheckoutOutcome::Success)
            .unwrap();
        let reconciled = fx.gateway.reconcile(intent.id).await.unwrap();
        assert_eq!(reconciled.status, PaymentStatus::Paid);
        assert!(reconciled.transaction_id.is_some());
        assert!(fx.settlement.find_by_payment(intent.id).await.unwrap().is_some());

        // reconciling again changes nothing
        let again = fx.gateway.reconcile(intent.id).await.unwrap();
        assert_eq!(again.version, reconciled.version);
    }

    #[tokio::test]
    async fn cancelling_reservation_cancels_open_payment_only() {
        let fx = Fixture::new(&["A-01", "A-02"]).await;
        let open = fx.active_reservation(1, 2).await;
        fx.gateway.create_intent(open.id, None).await.unwrap();
        let cancelled = fx.gateway.cancel_for_reservation(open.id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, PaymentStatus::Cancelled);

        let paid = fx.active_reservation(1, 2).await;
        let intent = fx.gateway.create_intent(paid.id, None).await.unwrap();
        fx.gateway.confirm_pos(intent.id).await.unwrap();
        let untouched = fx.gateway.cancel_for_reservation(paid.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn live_mode_needs_provider_or_demo_fallback() {
        let fx = Fixture::new(&["A-01"]).await;
        let r = fx.active_reservation(1, 2).await;
        assert!(matches!(
            fx.gateway.create_intent(r.id, Some(PaymentMode::GatewayLive)).await,
            Err(DomainError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn cancelling_reservation_voids_checkout_at_provider() {
        let fx = Fixture::new_gateway(&["A-01"]).await;
        let (payment, checkout) = open_checkout(&fx).await;

        fx.engine
            .cancel_reservation(AccessScope::Platform, payment.reservation_id)
            .await
            .unwrap();
        assert_eq!(fx.gateway.get(payment.id).await.unwrap().status, PaymentStatus::Cancelled);
        assert_eq!(
            fx.demo.lookup(&payment.provider_intent_id).await.unwrap(),
            IntentState::Voided
        );

        // the page no longer takes money; a stray callback changes nothing
        fx.demo.finish_checkout(&checkout.session_id, CheckoutOutcome::Success);
        let after = fx
            .gateway
            .complete_checkout(&checkout.session_id, CheckoutOutcome::Success, None)
            .await
            .unwrap();
        assert_eq!(after.status, PaymentStatus::Cancelled);
        assert!(fx.settlement.find_by_payment(payment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn capture_after_cancellation_is_refunded() {
        let fx = Fixture::new_gateway(&["A-01"]).await;
        let (payment, checkout) = open_checkout(&fx).await;

        fx.demo
            .inject_fault(operation::CANCEL, DemoFault::Reject("provider maintenance".into()));
        fx.engine
            .cancel_reservation(AccessScope::Platform, payment.reservation_id)
            .await
            .unwrap();
        assert_eq!(fx.gateway.get(payment.id).await.unwrap().status, PaymentStatus::Cancelled);

        // guest still pays on the page that could not be voided
        fx.demo.finish_checkout(&checkout.session_id, CheckoutOutcome::Success);
        let refunded = fx
            .gateway
            .complete_checkout(&checkout.session_id, CheckoutOutcome::Success, None)
            .await
            .unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
        assert!(refunded.transaction_id.is_some());
        assert_eq!(
            fx.demo.lookup(&payment.provider_intent_id).await.unwrap(),
            IntentState::Refunded
        );
        let settlement = fx.settlement.find_by_payment(payment.id).await.unwrap().unwrap();
        assert_eq!(settlement.status, SettlementStatus::Cancelled);

        let repeat = fx
            .gateway
            .complete_checkout(&checkout.session_id, CheckoutOutcome::Success, None)
            .await
            .unwrap();
        assert_eq!(repeat.version, refunded.version);
        assert_eq!(fx.gateway.reconcile(payment.id).await.unwrap().version, refunded.version);
    }

    #[tokio::test]
    async fn reconcile_refunds_capture_after_cancellation() {
        let fx = Fixture::new_gateway(&["A-01"]).await;
        let (payment, checkout) = open_checkout(&fx).await;

        fx.demo.inject_fault(operation::CANCEL, DemoFault::Transient);
        fx.demo.inject_fault(operation::CANCEL, DemoFault::Transient);
        fx.demo.inject_fault(operation::CANCEL, DemoFault::Transient);
        fx.gateway.cancel_for_reservation(payment.reservation_id).await.unwrap();

        // callback lost; the operator reconciles
        fx.demo.finish_checkout(&checkout.session_id, CheckoutOutcome::Success);
        let reconciled = fx.gateway.reconcile(payment.id).await.unwrap();
        assert_eq!(reconciled.status, PaymentStatus::Refunded);
        assert_eq!(
            fx.demo.lookup(&payment.provider_intent_id).await.unwrap(),
            IntentState::Refunded
        );
    }

    #[tokio::test]
    async fn reconcile_voids_checkout_left_open_by_cancellation() {
        let fx = Fixture::new_gateway(&["A-01"]).await;
        let (payment, checkout) = open_checkout(&fx).await;

        fx.demo
            .inject_fault(operation::CANCEL, DemoFault::Reject("provider maintenance".into()));
        fx.gateway.cancel_for_reservation(payment.reservation_id).await.unwrap();
        assert_eq!(
            fx.demo.lookup(&payment.provider_intent_id).await.unwrap(),
            IntentState::Open
        );

        let reconciled = fx.gateway.reconcile(payment.id).await.unwrap();
        assert_eq!(reconciled.status, PaymentStatus::Cancelled);
        fx.demo.finish_checkout(&checkout.session_id, CheckoutOutcome::Success);
        assert_eq!(
            fx.demo.lookup(&payment.provider_intent_id).await.unwrap(),
            IntentState::Voided
        );
    }

    #[tokio::test]
    async fn payment_taken_before_cancellation_is_kept_for_refund() {
        let fx = Fixture::new_gateway(&["A-01"]).await;
        let (payment, checkout) = open_checkout(&fx).await;

        // paid, callback still in flight
        fx.demo.finish_checkout(&checkout.session_id, CheckoutOutcome::Success);
        let kept = fx
            .gateway
            .cancel_for_reservation(payment.reservation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.status, PaymentStatus::Paid);
        assert!(fx.settlement.find_by_payment(payment.id).await.unwrap().is_some());

        let refunded = fx.gateway.refund(payment.id).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn redelivered_failure_for_superseded_session_is_noop() {
        let fx = Fixture::new_gateway(&["A-01"]).await;
        let (payment, first) = open_checkout(&fx).await;
        fx.gateway
            .complete_checkout(&first.session_id, CheckoutOutcome::Failed, None)
            .await
            .unwrap();
        let (retried, second) = fx.gateway.create_checkout_session(payment.id).await.unwrap();
        assert_ne!(second.session_id, first.session_id);

        let repeat = fx
            .gateway
            .complete_checkout(&first.session_id, CheckoutOutcome::Failed, None)
            .await
            .unwrap();
        assert_eq!(repeat.id, payment.id);
        assert_eq!(repeat.status, PaymentStatus::Pending);
        assert_eq!(repeat.version, retried.version);
        assert_eq!(repeat.checkout_session_id.as_deref(), Some(second.session_id.as_str()));
    }

    #[tokio::test]
    async fn late_success_on_superseded_session_is_refunded() {
        let fx = Fixture::new_gateway(&["A-01"]).await;
        let (payment, first) = open_checkout(&fx).await;
        let first_key = payment.provider_intent_id.clone();
        fx.gateway
            .complete_checkout(&first.session_id, CheckoutOutcome::Failed, None)
            .await
            .unwrap();
        let (retried, _) = fx.gateway.create_checkout_session(payment.id).await.unwrap();

        // the old page still took the card
        fx.demo.finish_checkout(&first.session_id, CheckoutOutcome::Success);
        let current = fx
            .gateway
            .complete_checkout(&first.session_id, CheckoutOutcome::Success, None)
            .await
            .unwrap();
        assert_eq!(current.status, PaymentStatus::Pending);
        assert_eq!(current.version, retried.version);
        assert_eq!(fx.demo.lookup(&first_key).await.unwrap(), IntentState::Refunded);
        assert!(fx.settlement.find_by_payment(payment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reconcile_records_card_hold_as_authorized() {
        let fx = Fixture::new_gateway(&["A-01"]).await;
        let (payment, checkout) = open_checkout(&fx).await;

        fx.demo.authorize_checkout(&checkout.session_id).unwrap();
        let held = fx.gateway.reconcile(payment.id).await.unwrap();
        assert_eq!(held.status, PaymentStatus::Authorized);
        assert!(fx.settlement.find_by_payment(payment.id).await.unwrap().is_none());

        fx.demo.finish_checkout(&checkout.session_id, CheckoutOutcome::Success);
        let paid = fx
            .gateway
            .complete_checkout(&checkout.session_id, CheckoutOutcome::Success, None)
            .await
            .unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);
        assert!(fx.settlement.find_by_payment(payment.id).await.unwrap().is_some());
    }
}
