pub mod events;
pub mod money;
pub mod payment;
pub mod repositories;
pub mod reservation;
pub mod settlement;
pub mod storage_unit;
pub mod tenant;

// Re-export commonly used types
pub use money::{split_commission, CommissionRate, CommissionSplit};
pub use payment::{
    CheckoutOutcome, CheckoutReference, Payment, PaymentAttempt, PaymentMode, PaymentStatus,
};
pub use repositories::{DomainResult, RepositoryProvider};
pub use reservation::{
    GuestInfo, NewReservation, Reservation, ReservationFilter, ReservationOrigin,
    ReservationStatus,
};
pub use settlement::{Settlement, SettlementFilter, SettlementStatus};
pub use storage_unit::{Location, StorageStatus, StorageUnit};
pub use tenant::Tenant;

pub use crate::shared::errors::DomainError;
