//! Reservation lifecycle and storage assignment

pub mod service;

pub use service::ReservationLedger;
