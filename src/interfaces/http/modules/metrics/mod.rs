pub mod handlers;
pub mod middleware;

pub use handlers::prometheus_metrics;
pub use middleware::http_metrics_middleware;
