//! Database entities module

pub mod location;
pub mod payment;
pub mod payment_attempt;
pub mod reservation;
pub mod settlement;
pub mod storage_unit;
pub mod tenant;

pub use location::Entity as Location;
pub use payment::Entity as Payment;
pub use payment_attempt::Entity as PaymentAttempt;
pub use reservation::Entity as Reservation;
pub use settlement::Entity as Settlement;
pub use storage_unit::Entity as StorageUnit;
pub use tenant::Entity as Tenant;
