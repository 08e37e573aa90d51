//! Inbound adapters: REST API and the dashboard event stream

pub mod http;
pub mod ws;
