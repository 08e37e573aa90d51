//! Reservation HTTP handlers

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use uuid::Uuid;

use crate::domain::{NewReservation, ReservationFilter, ReservationOrigin, ReservationStatus};
use crate::interfaces::http::common::{
    parse_field, ApiError, ApiResponse, ApiResult, PaginatedResponse, ValidatedJson,
};
use crate::interfaces::http::middleware::Caller;
use crate::interfaces::http::modules::payments::PaymentDto;
use crate::interfaces::http::state::AppState;
use crate::shared::types::PaginationParams;

use super::dto::*;

#[utoipa::path(
    get,
    path = "/api/v1/reservations",
    tag = "Reservations",
    security(("api_key" = [])),
    params(ReservationListQuery),
    responses(
        (status = 200, description = "Page of reservations", body = ApiResponse<PaginatedResponse<ReservationDto>>),
        (status = 403, description = "Filter names another tenant"),
        (status = 422, description = "Unknown status or origin")
    )
)]
pub async fn list_reservations(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ReservationListQuery>,
) -> ApiResult<PaginatedResponse<ReservationDto>> {
    let filter = ReservationFilter {
        tenant_id: query.tenant_id,
        location_id: query.location_id,
        storage_id: query.storage_id,
        status: query
            .status
            .as_deref()
            .map(|s| parse_field("status", s, ReservationStatus::parse))
            .transpose()?,
        origin: query
            .origin
            .as_deref()
            .map(|s| parse_field("origin", s, ReservationOrigin::parse))
            .transpose()?,
        starts_from: query.starts_from,
        starts_before: query.starts_before,
    };
    let page = PaginationParams::new(query.page, query.limit);

    let result = state.engine.list_reservations(caller.scope, filter, page).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::from_result(result))))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations",
    tag = "Reservations",
    security(("api_key" = [])),
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation created", body = ApiResponse<ReservationDto>),
        (status = 409, description = "Requested storage is taken or faulty"),
        (status = 422, description = "Invalid request")
    )
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ValidatedJson(request): ValidatedJson<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReservationDto>>), ApiError> {
    let tenant_id = request
        .tenant_id
        .or(caller.scope.tenant_id())
        .ok_or_else(|| ApiError::unprocessable("tenant_id: required for platform keys"))?;
    let origin = match request.origin.as_deref() {
        Some(raw) => parse_field("origin", raw, ReservationOrigin::parse)?,
        None => ReservationOrigin::Api,
    };

    let input = NewReservation {
        tenant_id,
        location_id: request.location_id,
        storage_id: request.storage_id,
        start_at: request.start_at,
        end_at: request.end_at,
        guest: request.guest.into(),
        amount_minor: request.amount_minor,
        currency: request.currency,
        origin,
        payment_required: request.payment_required.unwrap_or(true),
    };

    let reservation = state.engine.create_reservation(caller.scope, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(reservation.into())),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations/{id}",
    tag = "Reservations",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation", body = ApiResponse<ReservationDto>),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<ReservationDto> {
    let reservation = state.engine.get_reservation(caller.scope, id).await?;
    Ok(Json(ApiResponse::success(reservation.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/convert",
    tag = "Reservations",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Reservation ID")),
    request_body(content = ConvertRequest, description = "Optional; omit to auto-select a storage unit"),
    responses(
        (status = 200, description = "Reservation converted", body = ApiResponse<ConversionDto>),
        (status = 409, description = "Not convertible, or no storage free"),
        (status = 502, description = "Checkout provider failed")
    )
)]
pub async fn convert_reservation(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<ConversionDto> {
    // An empty body means "pick a unit"
    let request: ConvertRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ConvertRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))?
    };

    let result = state
        .engine
        .convert(caller.scope, id, request.storage_id)
        .await?;
    Ok(Json(ApiResponse::success(result.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/complete",
    tag = "Reservations",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation completed", body = ApiResponse<ReservationDto>),
        (status = 409, description = "Reservation is not active")
    )
)]
pub async fn complete_reservation(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<ReservationDto> {
    let reservation = state.engine.complete_reservation(caller.scope, id).await?;
    Ok(Json(ApiResponse::success(reservation.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/cancel",
    tag = "Reservations",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation cancelled", body = ApiResponse<ReservationDto>),
        (status = 409, description = "Reservation already ended")
    )
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<ReservationDto> {
    let reservation = state.engine.cancel_reservation(caller.scope, id).await?;
    Ok(Json(ApiResponse::success(reservation.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/no-show",
    tag = "Reservations",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation marked as no-show", body = ApiResponse<ReservationDto>),
        (status = 409, description = "Not reserved, or start time not reached")
    )
)]
pub async fn mark_no_show(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<ReservationDto> {
    let reservation = state.engine.mark_no_show(caller.scope, id).await?;
    Ok(Json(ApiResponse::success(reservation.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations/{id}/payment",
    tag = "Reservations",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Payment of the reservation", body = ApiResponse<PaymentDto>),
        (status = 404, description = "Reservation has no payment yet")
    )
)]
pub async fn get_reservation_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<PaymentDto> {
    let payment = state
        .engine
        .payment_for_reservation(caller.scope, id)
        .await?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("Reservation {} has no payment", id)))?;
    Ok(Json(ApiResponse::success(payment.into())))
}
