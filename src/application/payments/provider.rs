//! Hosted-checkout provider seam
//!
//! `CheckoutProvider` is the only thing the gateway knows about an
//! external payment processor. Every call is keyed by the payment's
//! `provider_intent_id`, so repeating a call never creates a second charge
//! or a second refund.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{CheckoutOutcome, CheckoutReference};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Network blip, 5xx, rate limit. Safe to retry with the same key.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// The provider answered and refused the request.
    #[error("provider rejected the request: {0}")]
    Rejected(String),

    /// No answer in time; the provider may or may not have acted.
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

/// What the gateway asks the provider to charge
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub intent_id: String,
    pub payment_id: Uuid,
    pub reservation_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
}

/// Provider's view of an intent, used by reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentState {
    /// Checkout opened but not finished
    Open,
    /// Card hold placed, not yet captured
    Authorized,
    Paid { transaction_id: Option<String> },
    Failed { reason: String },
    Refunded,
    /// Checkout closed before the guest paid; it can no longer be paid
    Voided,
    /// The provider has never seen this key
    Unknown,
}

#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    /// Stored in `Payment::provider`
    fn name(&self) -> &'static str;

    /// Open (or return the already open) hosted checkout for an intent.
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutReference, ProviderError>;

    async fn lookup(&self, intent_id: &str) -> Result<IntentState, ProviderError>;

    /// Refund a paid intent in full. Idempotent per intent.
    async fn refund(&self, intent_id: &str, amount_minor: i64) -> Result<(), ProviderError>;

    /// Close the intent's checkout so it can no longer be paid.
    ///
    /// Returns the intent's state afterwards: `Voided` on success, or
    /// whatever terminal state the guest already reached (e.g. `Paid`).
    async fn cancel(&self, intent_id: &str) -> Result<IntentState, ProviderError>;
}

// ── Demo provider ───────────────────────────────────────────────

/// Operation names used for fault injection
pub mod operation {
    pub const CREATE_CHECKOUT: &str = "create_checkout";
    pub const LOOKUP: &str = "lookup";
    pub const REFUND: &str = "refund";
    pub const CANCEL: &str = "cancel";
}

/// Scripted failure for the next call of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemoFault {
    Transient,
    Reject(String),
    /// Never answer; the caller's timeout fires
    Hang,
}

#[derive(Debug, Clone)]
struct DemoIntent {
    session_id: String,
    redirect_url: String,
    amount_minor: i64,
    state: IntentState,
}

/// In-process provider for `GATEWAY_DEMO`.
///
/// Checkouts are kept in memory. The guest's action on the hosted page is
/// simulated with `finish_checkout`; the resulting callback is delivered to
/// the gateway separately, as a real provider's webhook would be.
pub struct DemoCheckoutProvider {
    base_url: String,
    intents: DashMap<String, DemoIntent>,
    faults: DashMap<&'static str, VecDeque<DemoFault>>,
}

impl DemoCheckoutProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            intents: DashMap::new(),
            faults: DashMap::new(),
        }
    }

    /// Queue a failure for the next call to `operation`
    pub fn inject_fault(&self, operation: &'static str, fault: DemoFault) {
        self.faults.entry(operation).or_default().push_back(fault);
    }

    /// Simulate the guest's card being held without capture
    pub fn authorize_checkout(&self, session_id: &str) -> Option<String> {
        let mut entry = self
            .intents
            .iter_mut()
            .find(|i| i.session_id == session_id)?;
        if entry.state == IntentState::Open {
            entry.state = IntentState::Authorized;
        }
        Some(entry.key().clone())
    }

    /// Simulate the guest finishing the hosted checkout.
    /// Returns the intent key the session belongs to.
    pub fn finish_checkout(&self, session_id: &str, outcome: CheckoutOutcome) -> Option<String> {
        let mut entry = self
            .intents
            .iter_mut()
            .find(|i| i.session_id == session_id)?;
        if matches!(entry.state, IntentState::Open | IntentState::Authorized) {
            entry.state = match outcome {
                CheckoutOutcome::Success => IntentState::Paid {
                    transaction_id: Some(format!("txn_demo_{}", Uuid::new_v4().simple())),
                },
                CheckoutOutcome::Failed => IntentState::Failed {
                    reason: "declined on demo checkout page".to_string(),
                },
            };
        }
        Some(entry.key().clone())
    }

    async fn take_fault(&self, operation: &'static str) -> Result<(), ProviderError> {
        let fault = self
            .faults
            .get_mut(operation)
            .and_then(|mut queue| queue.pop_front());
        match fault {
            None => Ok(()),
            Some(DemoFault::Transient) => Err(ProviderError::Transient(format!(
                "demo {} unavailable",
                operation
            ))),
            Some(DemoFault::Reject(reason)) => Err(ProviderError::Rejected(reason)),
            Some(DemoFault::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::Transient(format!("demo {} hung", operation)))
            }
        }
    }
}

#[async_trait]
impl CheckoutProvider for DemoCheckoutProvider {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutReference, ProviderError> {
        self.take_fault(operation::CREATE_CHECKOUT).await?;

        let intent = self
            .intents
            .entry(request.intent_id.clone())
            .or_insert_with(|| {
                let session_id = format!("cs_demo_{}", Uuid::new_v4().simple());
                DemoIntent {
                    redirect_url: format!("{}/{}", self.base_url, session_id),
                    session_id,
                    amount_minor: request.amount_minor,
                    state: IntentState::Open,
                }
            })
            .clone();

        debug!(
            intent_id = %request.intent_id,
            session_id = %intent.session_id,
            amount = intent.amount_minor,
            currency = %request.currency,
            "Demo checkout opened"
        );
        Ok(CheckoutReference {
            session_id: intent.session_id,
            redirect_url: intent.redirect_url,
        })
    }

    async fn lookup(&self, intent_id: &str) -> Result<IntentState, ProviderError> {
        self.take_fault(operation::LOOKUP).await?;
        Ok(self
            .intents
            .get(intent_id)
            .map(|i| i.state.clone())
            .unwrap_or(IntentState::Unknown))
    }

    async fn refund(&self, intent_id: &str, amount_minor: i64) -> Result<(), ProviderError> {
        self.take_fault(operation::REFUND).await?;
        let mut intent = self
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| ProviderError::Rejected(format!("unknown intent {}", intent_id)))?;
        match intent.state {
            IntentState::Refunded => Ok(()),
            IntentState::Paid { .. } if amount_minor == intent.amount_minor => {
                intent.state = IntentState::Refunded;
                Ok(())
            }
            IntentState::Paid { .. } => Err(ProviderError::Rejected(format!(
                "partial refund of {} not supported",
                amount_minor
            ))),
            _ => Err(ProviderError::Rejected(format!(
                "intent {} is not paid",
                intent_id
            ))),
        }
    }

    async fn cancel(&self, intent_id: &str) -> Result<IntentState, ProviderError> {
        self.take_fault(operation::CANCEL).await?;
        let Some(mut intent) = self.intents.get_mut(intent_id) else {
            return Ok(IntentState::Voided);
        };
        if matches!(intent.state, IntentState::Open | IntentState::Authorized) {
            intent.state = IntentState::Voided;
            debug!(intent_id, session_id = %intent.session_id, "Demo checkout voided");
        }
        Ok(intent.state.clone())
    }
}
