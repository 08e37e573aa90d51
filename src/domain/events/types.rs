//! Lifecycle event types
//!
//! Every event names the tenant it belongs to so subscribers can be
//! scoped to a single hotel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    PaymentMode, PaymentStatus, ReservationOrigin, ReservationStatus, SettlementStatus,
};

/// Event types for notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    ReservationCreated(ReservationCreatedEvent),
    ReservationStatusChanged(ReservationStatusChangedEvent),
    /// Storage bound and payment captured by a conversion
    ReservationConverted(ReservationConvertedEvent),
    PaymentStatusChanged(PaymentStatusChangedEvent),
    SettlementCreated(SettlementCreatedEvent),
    SettlementStatusChanged(SettlementStatusChangedEvent),
}

impl Event {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::ReservationCreated(_) => "reservation_created",
            Event::ReservationStatusChanged(_) => "reservation_status_changed",
            Event::ReservationConverted(_) => "reservation_converted",
            Event::PaymentStatusChanged(_) => "payment_status_changed",
            Event::SettlementCreated(_) => "settlement_created",
            Event::SettlementStatusChanged(_) => "settlement_status_changed",
        }
    }

    pub fn tenant_id(&self) -> Uuid {
        match self {
            Event::ReservationCreated(e) => e.tenant_id,
            Event::ReservationStatusChanged(e) => e.tenant_id,
            Event::ReservationConverted(e) => e.tenant_id,
            Event::PaymentStatusChanged(e) => e.tenant_id,
            Event::SettlementCreated(e) => e.tenant_id,
            Event::SettlementStatusChanged(e) => e.tenant_id,
        }
    }

    /// Reservation the event concerns
    pub fn reservation_id(&self) -> Uuid {
        match self {
            Event::ReservationCreated(e) => e.reservation_id,
            Event::ReservationStatusChanged(e) => e.reservation_id,
            Event::ReservationConverted(e) => e.reservation_id,
            Event::PaymentStatusChanged(e) => e.reservation_id,
            Event::SettlementCreated(e) => e.reservation_id,
            Event::SettlementStatusChanged(e) => e.reservation_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationCreatedEvent {
    pub reservation_id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub status: ReservationStatus,
    pub origin: ReservationOrigin,
    pub storage_id: Option<Uuid>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationStatusChangedEvent {
    pub reservation_id: Uuid,
    pub tenant_id: Uuid,
    pub from: ReservationStatus,
    pub to: ReservationStatus,
    pub storage_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationConvertedEvent {
    pub reservation_id: Uuid,
    pub tenant_id: Uuid,
    pub storage_id: Uuid,
    pub payment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusChangedEvent {
    pub payment_id: Uuid,
    pub reservation_id: Uuid,
    pub tenant_id: Uuid,
    pub mode: PaymentMode,
    /// `None` when the payment was just created
    pub from: Option<PaymentStatus>,
    pub to: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementCreatedEvent {
    pub settlement_id: Uuid,
    pub payment_id: Uuid,
    pub reservation_id: Uuid,
    pub tenant_id: Uuid,
    pub total_amount_minor: i64,
    pub kyradi_commission_minor: i64,
    pub tenant_settlement_minor: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementStatusChangedEvent {
    pub settlement_id: Uuid,
    pub reservation_id: Uuid,
    pub tenant_id: Uuid,
    pub from: SettlementStatus,
    pub to: SettlementStatus,
}

/// Wrapper for sending events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}
