//! Settlement HTTP handlers

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::domain::{SettlementFilter, SettlementStatus};
use crate::interfaces::http::common::{
    parse_field, ApiResponse, ApiResult, PaginatedResponse, ValidatedJson,
};
use crate::interfaces::http::middleware::Caller;
use crate::interfaces::http::state::AppState;
use crate::shared::types::PaginationParams;

use super::dto::*;

#[utoipa::path(
    get,
    path = "/api/v1/settlements",
    tag = "Settlements",
    security(("api_key" = [])),
    params(SettlementListQuery),
    responses(
        (status = 200, description = "Page of settlements", body = ApiResponse<PaginatedResponse<SettlementDto>>),
        (status = 403, description = "Filter names another tenant")
    )
)]
pub async fn list_settlements(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<SettlementListQuery>,
) -> ApiResult<PaginatedResponse<SettlementDto>> {
    let filter = SettlementFilter {
        tenant_id: query.tenant_id,
        reservation_id: query.reservation_id,
        status: query
            .status
            .as_deref()
            .map(|s| parse_field("status", s, SettlementStatus::parse))
            .transpose()?,
        created_from: query.created_from,
        created_before: query.created_before,
    };
    let page = PaginationParams::new(query.page, query.limit);

    let result = state.engine.list_settlements(caller.scope, filter, page).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::from_result(result))))
}

#[utoipa::path(
    get,
    path = "/api/v1/settlements/{id}",
    tag = "Settlements",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Settlement ID")),
    responses(
        (status = 200, description = "Settlement", body = ApiResponse<SettlementDto>),
        (status = 404, description = "Settlement not found")
    )
)]
pub async fn get_settlement(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<SettlementDto> {
    let settlement = state.engine.get_settlement(caller.scope, id).await?;
    Ok(Json(ApiResponse::success(settlement.into())))
}

#[utoipa::path(
    put,
    path = "/api/v1/settlements/{id}/status",
    tag = "Settlements",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Settlement ID")),
    request_body = UpdateSettlementStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<SettlementDto>),
        (status = 403, description = "Platform key required"),
        (status = 409, description = "Transition not allowed")
    )
)]
pub async fn update_settlement_status(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateSettlementStatusRequest>,
) -> ApiResult<SettlementDto> {
    let status = parse_field("status", &request.status, SettlementStatus::parse)?;
    let settlement = state
        .engine
        .update_settlement_status(caller.scope, id, status)
        .await?;
    Ok(Json(ApiResponse::success(settlement.into())))
}
