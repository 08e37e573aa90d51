//! Payment HTTP handlers

use axum::extract::{Path, State};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::domain::CheckoutOutcome;
use crate::interfaces::http::common::{parse_field, ApiResponse, ApiResult, ValidatedJson};
use crate::interfaces::http::middleware::Caller;
use crate::interfaces::http::state::AppState;

use super::dto::*;

#[utoipa::path(
    get,
    path = "/api/v1/payments/{id}",
    tag = "Payments",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Payment", body = ApiResponse<PaymentDto>),
        (status = 403, description = "Payment belongs to another tenant"),
        (status = 404, description = "Payment not found")
    )
)]
pub async fn get_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<PaymentDto> {
    let payment = state.engine.get_payment(caller.scope, id).await?;
    Ok(Json(ApiResponse::success(payment.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/capture",
    tag = "Payments",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Paid, or a checkout to complete", body = ApiResponse<CaptureResponse>),
        (status = 409, description = "Payment is not open"),
        (status = 502, description = "Checkout provider failed")
    )
)]
pub async fn capture_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<CaptureResponse> {
    let outcome = state.engine.capture(caller.scope, id).await?;
    Ok(Json(ApiResponse::success(outcome.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/confirm",
    tag = "Payments",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Cash or POS payment confirmed", body = ApiResponse<PaymentDto>),
        (status = 409, description = "Not a manual payment, or not open")
    )
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<PaymentDto> {
    let payment = state.engine.confirm_pos(caller.scope, id).await?;
    Ok(Json(ApiResponse::success(payment.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/checkout",
    tag = "Payments",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Checkout session", body = ApiResponse<CheckoutSessionResponse>),
        (status = 409, description = "Not a gateway payment, or already paid"),
        (status = 502, description = "Checkout provider failed")
    )
)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<CheckoutSessionResponse> {
    let (payment, checkout) = state.engine.create_checkout_session(caller.scope, id).await?;
    Ok(Json(ApiResponse::success(CheckoutSessionResponse {
        payment: payment.into(),
        checkout: checkout.into(),
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/refund",
    tag = "Payments",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Refunded", body = ApiResponse<PaymentDto>),
        (status = 409, description = "Payment is not paid"),
        (status = 502, description = "Provider refund failed; reconcile before retrying")
    )
)]
pub async fn refund_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<PaymentDto> {
    let payment = state.engine.refund_payment(caller.scope, id).await?;
    Ok(Json(ApiResponse::success(payment.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/reconcile",
    tag = "Payments",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Local state matches the provider", body = ApiResponse<PaymentDto>),
        (status = 409, description = "Provider reports a conflicting state")
    )
)]
pub async fn reconcile_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<PaymentDto> {
    let payment = state.engine.reconcile_payment(caller.scope, id).await?;
    Ok(Json(ApiResponse::success(payment.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/checkout/complete",
    tag = "Payments",
    security(("api_key" = [])),
    request_body = CompleteCheckoutRequest,
    responses(
        (status = 200, description = "Outcome applied", body = ApiResponse<PaymentDto>),
        (status = 403, description = "Platform key required"),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Session already finished with another outcome")
    )
)]
pub async fn complete_checkout(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ValidatedJson(request): ValidatedJson<CompleteCheckoutRequest>,
) -> ApiResult<PaymentDto> {
    let outcome = parse_field("outcome", &request.outcome, CheckoutOutcome::parse)?;
    let payment = state
        .engine
        .complete_checkout(caller.scope, &request.session_id, outcome, request.transaction_id)
        .await?;
    Ok(Json(ApiResponse::success(payment.into())))
}
