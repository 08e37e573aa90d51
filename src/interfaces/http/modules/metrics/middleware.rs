//! Per-request HTTP metrics
//!
//! `kyradi_http_requests_total{method, route, status}` and
//! `kyradi_http_request_duration_seconds{method, route}`. The route label is
//! the matched template (`/api/v1/reservations/{id}`) so ids do not blow up
//! cardinality.

use std::time::Instant;

use axum::{body::Body, extract::MatchedPath, http::Request, middleware::Next, response::Response};

pub async fn http_metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().as_str().to_owned();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let started = Instant::now();
    let response = next.run(request).await;
    let elapsed = started.elapsed().as_secs_f64();

    metrics::counter!(
        "kyradi_http_requests_total",
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    metrics::histogram!(
        "kyradi_http_request_duration_seconds",
        "method" => method,
        "route" => route
    )
    .record(elapsed);

    response
}
