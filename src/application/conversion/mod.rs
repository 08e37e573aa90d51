//! Reservation conversion (storage assignment + payment intent)

pub mod service;

pub use service::{ConversionResult, ConversionService};
