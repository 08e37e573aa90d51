//! API router with Swagger UI

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::interfaces::http::common::{ApiResponse, PaginatedResponse};
use crate::interfaces::http::middleware::api_key_middleware;
use crate::interfaces::http::modules::metrics::{http_metrics_middleware, prometheus_metrics};
use crate::interfaces::http::modules::request_id::request_id_middleware;
use crate::interfaces::http::modules::{catalog, health, payments, reservations, settlements};
use crate::interfaces::http::state::AppState;
use crate::interfaces::ws::ws_events_handler;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        // Reservations
        reservations::list_reservations,
        reservations::create_reservation,
        reservations::get_reservation,
        reservations::convert_reservation,
        reservations::complete_reservation,
        reservations::cancel_reservation,
        reservations::mark_no_show,
        reservations::get_reservation_payment,
        // Payments
        payments::get_payment,
        payments::capture_payment,
        payments::confirm_payment,
        payments::create_checkout_session,
        payments::refund_payment,
        payments::reconcile_payment,
        payments::complete_checkout,
        // Settlements
        settlements::list_settlements,
        settlements::get_settlement,
        settlements::update_settlement_status,
        // Catalog
        catalog::list_tenants,
        catalog::create_tenant,
        catalog::get_tenant,
        catalog::update_tenant,
        catalog::list_locations,
        catalog::create_location,
        catalog::list_storage_units,
        catalog::create_storage_unit,
        catalog::set_storage_status,
    ),
    components(
        schemas(
            ApiResponse<String>,
            PaginatedResponse<reservations::ReservationDto>,
            PaginatedResponse<settlements::SettlementDto>,
            health::HealthResponse,
            health::ComponentHealth,
            reservations::GuestDto,
            reservations::CreateReservationRequest,
            reservations::ReservationDto,
            reservations::ConvertRequest,
            reservations::ConversionDto,
            payments::PaymentDto,
            payments::CheckoutDto,
            payments::CheckoutSessionResponse,
            payments::CaptureResponse,
            payments::CompleteCheckoutRequest,
            settlements::SettlementDto,
            settlements::UpdateSettlementStatusRequest,
            catalog::TenantDto,
            catalog::CreateTenantRequest,
            catalog::UpdateTenantRequest,
            catalog::LocationDto,
            catalog::CreateLocationRequest,
            catalog::StorageUnitDto,
            catalog::CreateStorageUnitRequest,
            catalog::UpdateStorageStatusRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and storage readiness"),
        (name = "Reservations", description = "Booking lifecycle: create, convert, complete, cancel, no-show"),
        (name = "Payments", description = "Payment intents, capture, checkout, refund and reconciliation"),
        (name = "Settlements", description = "Revenue split between hotel and Kyradi"),
        (name = "Tenants", description = "Hotel tenants and their locations"),
        (name = "Storage Units", description = "Lockers and shelves at a location"),
    ),
    info(
        title = "Kyradi Booking Engine API",
        version = "1.0.0",
        description = "Reservation, payment and settlement lifecycle for hotel luggage storage"
    )
)]
pub struct ApiDoc;

/// Build the full HTTP surface.
///
/// `/health`, `/metrics` and `/docs` are public; everything under `/api/v1`
/// requires an API key. `metrics` is `None` when no Prometheus recorder is
/// installed.
pub fn create_api_router(state: AppState, metrics: Option<PrometheusHandle>) -> Router {
    let api = Router::new()
        // Reservations
        .route(
            "/api/v1/reservations",
            get(reservations::list_reservations).post(reservations::create_reservation),
        )
        .route("/api/v1/reservations/{id}", get(reservations::get_reservation))
        .route(
            "/api/v1/reservations/{id}/convert",
            post(reservations::convert_reservation),
        )
        .route(
            "/api/v1/reservations/{id}/complete",
            post(reservations::complete_reservation),
        )
        .route(
            "/api/v1/reservations/{id}/cancel",
            post(reservations::cancel_reservation),
        )
        .route(
            "/api/v1/reservations/{id}/no-show",
            post(reservations::mark_no_show),
        )
        .route(
            "/api/v1/reservations/{id}/payment",
            get(reservations::get_reservation_payment),
        )
        // Payments
        .route("/api/v1/payments/{id}", get(payments::get_payment))
        .route("/api/v1/payments/{id}/capture", post(payments::capture_payment))
        .route("/api/v1/payments/{id}/confirm", post(payments::confirm_payment))
        .route(
            "/api/v1/payments/{id}/checkout",
            post(payments::create_checkout_session),
        )
        .route("/api/v1/payments/{id}/refund", post(payments::refund_payment))
        .route(
            "/api/v1/payments/{id}/reconcile",
            post(payments::reconcile_payment),
        )
        .route("/api/v1/checkout/complete", post(payments::complete_checkout))
        // Settlements
        .route("/api/v1/settlements", get(settlements::list_settlements))
        .route("/api/v1/settlements/{id}", get(settlements::get_settlement))
        .route(
            "/api/v1/settlements/{id}/status",
            put(settlements::update_settlement_status),
        )
        // Catalog
        .route(
            "/api/v1/tenants",
            get(catalog::list_tenants).post(catalog::create_tenant),
        )
        .route(
            "/api/v1/tenants/{id}",
            get(catalog::get_tenant).patch(catalog::update_tenant),
        )
        .route(
            "/api/v1/tenants/{id}/locations",
            get(catalog::list_locations).post(catalog::create_location),
        )
        .route(
            "/api/v1/locations/{id}/storage-units",
            get(catalog::list_storage_units).post(catalog::create_storage_unit),
        )
        .route(
            "/api/v1/storage-units/{id}/status",
            put(catalog::set_storage_status),
        )
        // Event stream
        .route("/api/v1/events/ws", get(ws_events_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health::health_check))
        .merge(api)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    if let Some(handle) = metrics {
        app = app.merge(
            Router::new()
                .route("/metrics", get(prometheus_metrics))
                .with_state(handle),
        );
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    app.layer(middleware::from_fn(http_metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
