//! Settlement aggregate

pub mod model;
pub mod repository;

pub use model::{Settlement, SettlementFilter, SettlementStatus};
pub use repository::SettlementRepository;
