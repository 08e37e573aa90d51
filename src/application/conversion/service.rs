//! Reservation → active booking conversion
//!
//! Orchestrates the ledger and the gateway: bind a storage, then make
//! sure the payment intent (and, for gateway modes, the hosted checkout)
//! exists. Every step is idempotent, so a failed `convert` is retried by
//! calling it again; steps already done are skipped.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::events::{Event, ReservationConvertedEvent, SharedEventBus};
use crate::application::ledger::ReservationLedger;
use crate::application::payments::PaymentGateway;
use crate::domain::{
    CheckoutReference, DomainError, DomainResult, Payment, PaymentStatus, Reservation,
    ReservationStatus,
};

#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub reservation: Reservation,
    pub payment: Option<Payment>,
    /// Set for gateway modes while the payment is still open
    pub checkout: Option<CheckoutReference>,
}

pub struct ConversionService {
    ledger: Arc<ReservationLedger>,
    gateway: Arc<PaymentGateway>,
    event_bus: SharedEventBus,
}

impl ConversionService {
    pub fn new(
        ledger: Arc<ReservationLedger>,
        gateway: Arc<PaymentGateway>,
        event_bus: SharedEventBus,
    ) -> Self {
        Self {
            ledger,
            gateway,
            event_bus,
        }
    }

    /// Convert a `reserved` reservation into an active booking.
    ///
    /// An already converted reservation returns its current result; asking
    /// for a different storage than the one bound is `Conflict`.
    pub async fn convert(
        &self,
        reservation_id: Uuid,
        storage_id: Option<Uuid>,
    ) -> DomainResult<ConversionResult> {
        let current = self.ledger.get(reservation_id).await?;

        let (reservation, assigned) = if current.is_converted() {
            check_same_storage(&current, storage_id)?;
            debug!(%reservation_id, "Reservation already converted");
            (current, false)
        } else if current.status == ReservationStatus::Reserved {
            match self.ledger.assign_storage(reservation_id, storage_id).await {
                Ok(reservation) => (reservation, true),
                // a concurrent convert of the same reservation got there first
                Err(DomainError::InvalidTransition { .. }) => {
                    let reloaded = self.ledger.get(reservation_id).await?;
                    if !reloaded.is_converted() {
                        return Err(not_convertible(&reloaded));
                    }
                    check_same_storage(&reloaded, storage_id)?;
                    (reloaded, false)
                }
                Err(e) => return Err(e),
            }
        } else {
            return Err(not_convertible(&current));
        };

        let existing_payment = self.gateway.find_by_reservation(reservation_id).await?;
        let (payment, checkout) = self.ensure_payment(&reservation, existing_payment.clone()).await?;

        let payment_created = existing_payment.is_none() && payment.is_some();
        if assigned || payment_created {
            info!(
                %reservation_id,
                storage_id = ?reservation.storage_id,
                payment_id = ?payment.as_ref().map(|p| p.id),
                "Reservation converted"
            );
            if let Some(storage_id) = reservation.storage_id {
                self.event_bus
                    .publish(Event::ReservationConverted(ReservationConvertedEvent {
                        reservation_id,
                        tenant_id: reservation.tenant_id,
                        storage_id,
                        payment_id: payment.as_ref().map(|p| p.id),
                    }));
            }
        }

        Ok(ConversionResult {
            reservation,
            payment,
            checkout,
        })
    }

    async fn ensure_payment(
        &self,
        reservation: &Reservation,
        existing: Option<Payment>,
    ) -> DomainResult<(Option<Payment>, Option<CheckoutReference>)> {
        if !reservation.payment_required {
            return Ok((existing, None));
        }

        let payment = match existing {
            Some(payment) => payment,
            // no new intents once the booking has moved on
            None if reservation.status != ReservationStatus::Active => return Ok((None, None)),
            None => self.gateway.create_intent(reservation.id, None).await?,
        };

        let wants_checkout = !payment.mode.is_manual()
            && (payment.status.is_open() || payment.status == PaymentStatus::Failed)
            && reservation.status == ReservationStatus::Active;
        if !wants_checkout {
            let checkout = payment.checkout_reference().filter(|_| payment.status.is_open());
            return Ok((Some(payment), checkout));
        }

        let (payment, checkout) = self.gateway.create_checkout_session(payment.id).await?;
        Ok((Some(payment), Some(checkout)))
    }
}

fn check_same_storage(reservation: &Reservation, requested: Option<Uuid>) -> DomainResult<()> {
    match requested {
        Some(id) if reservation.storage_id != Some(id) => Err(DomainError::Conflict(format!(
            "reservation {} is already converted onto another storage",
            reservation.id
        ))),
        _ => Ok(()),
    }
}

fn not_convertible(reservation: &Reservation) -> DomainError {
    DomainError::InvalidTransition {
        entity: "Reservation",
        from: reservation.status.to_string(),
        action: "convert",
    }
}
