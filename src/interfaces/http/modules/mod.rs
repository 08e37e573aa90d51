//! HTTP modules: one per resource, each with `dto` and `handlers`

pub mod catalog;
pub mod health;
pub mod metrics;
pub mod payments;
pub mod request_id;
pub mod reservations;
pub mod settlements;
