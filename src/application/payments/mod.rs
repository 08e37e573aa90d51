//! Payment intents, capture and refunds

pub mod gateway;
pub mod provider;

pub use gateway::{CaptureOutcome, GatewayConfig, PaymentGateway, MANUAL_PROVIDER};
pub use provider::{
    CheckoutProvider, CheckoutRequest, DemoCheckoutProvider, DemoFault, IntentState, ProviderError,
};
