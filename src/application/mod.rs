pub mod catalog;
pub mod conversion;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod payments;
pub mod settlement;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for convenience
pub use catalog::{CatalogService, NewTenant, TenantUpdate};
pub use conversion::{ConversionResult, ConversionService};
pub use engine::{AccessScope, CheckoutProviders, LifecycleEngine};
pub use events::{create_event_bus, Event, EventBus, EventSubscriber, SharedEventBus};
pub use ledger::ReservationLedger;
pub use payments::{
    CaptureOutcome, CheckoutProvider, DemoCheckoutProvider, GatewayConfig, PaymentGateway,
    ProviderError,
};
pub use settlement::{start_settlement_sweeper, SettlementCalculator};
