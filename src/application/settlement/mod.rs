pub mod calculator;
pub mod sweeper;

pub use calculator::SettlementCalculator;
pub use sweeper::start_settlement_sweeper;
