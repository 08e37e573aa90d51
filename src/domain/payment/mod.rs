//! Payment aggregate

pub mod model;
pub mod repository;

pub use model::{
    CheckoutOutcome, CheckoutReference, Payment, PaymentAttempt, PaymentMode, PaymentStatus,
};
pub use repository::PaymentRepository;
