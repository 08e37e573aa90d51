//! Tenant catalog HTTP handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use uuid::Uuid;

use crate::application::{NewTenant, TenantUpdate};
use crate::domain::{CommissionRate, PaymentMode, StorageStatus};
use crate::interfaces::http::common::{parse_field, ApiError, ApiResponse, ApiResult, ValidatedJson};
use crate::interfaces::http::middleware::Caller;
use crate::interfaces::http::state::AppState;

use super::dto::*;

type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn created<T>(data: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

#[utoipa::path(
    get,
    path = "/api/v1/tenants",
    tag = "Tenants",
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Tenants visible to the caller", body = ApiResponse<Vec<TenantDto>>)
    )
)]
pub async fn list_tenants(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Vec<TenantDto>> {
    let tenants = state.engine.list_tenants(caller.scope).await?;
    Ok(Json(ApiResponse::success(
        tenants.into_iter().map(Into::into).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/tenants",
    tag = "Tenants",
    security(("api_key" = [])),
    request_body = CreateTenantRequest,
    responses(
        (status = 201, description = "Tenant created", body = ApiResponse<TenantDto>),
        (status = 403, description = "Platform key required"),
        (status = 422, description = "Invalid rate, mode or currency")
    )
)]
pub async fn create_tenant(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ValidatedJson(request): ValidatedJson<CreateTenantRequest>,
) -> Created<TenantDto> {
    let input = NewTenant {
        name: request.name,
        commission_rate: request.commission_rate.parse::<CommissionRate>()?,
        payment_mode: parse_field("payment_mode", &request.payment_mode, PaymentMode::parse)?,
        currency: request.currency,
    };
    let tenant = state.engine.create_tenant(caller.scope, input).await?;
    created(tenant.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/tenants/{id}",
    tag = "Tenants",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Tenant ID")),
    responses(
        (status = 200, description = "Tenant", body = ApiResponse<TenantDto>),
        (status = 403, description = "Another tenant"),
        (status = 404, description = "Tenant not found")
    )
)]
pub async fn get_tenant(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<TenantDto> {
    let tenant = state.engine.get_tenant(caller.scope, id).await?;
    Ok(Json(ApiResponse::success(tenant.into())))
}

#[utoipa::path(
    patch,
    path = "/api/v1/tenants/{id}",
    tag = "Tenants",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Tenant ID")),
    request_body = UpdateTenantRequest,
    responses(
        (status = 200, description = "Tenant updated; new rate applies to future settlements", body = ApiResponse<TenantDto>),
        (status = 403, description = "Platform key required")
    )
)]
pub async fn update_tenant(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateTenantRequest>,
) -> ApiResult<TenantDto> {
    let update = TenantUpdate {
        name: request.name,
        commission_rate: request
            .commission_rate
            .as_deref()
            .map(str::parse::<CommissionRate>)
            .transpose()?,
        payment_mode: request
            .payment_mode
            .as_deref()
            .map(|m| parse_field("payment_mode", m, PaymentMode::parse))
            .transpose()?,
    };
    let tenant = state.engine.update_tenant(caller.scope, id, update).await?;
    Ok(Json(ApiResponse::success(tenant.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/tenants/{id}/locations",
    tag = "Tenants",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Tenant ID")),
    responses(
        (status = 200, description = "Locations of the tenant", body = ApiResponse<Vec<LocationDto>>)
    )
)]
pub async fn list_locations(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(tenant_id): Path<Uuid>,
) -> ApiResult<Vec<LocationDto>> {
    let locations = state.engine.list_locations(caller.scope, tenant_id).await?;
    Ok(Json(ApiResponse::success(
        locations.into_iter().map(Into::into).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/tenants/{id}/locations",
    tag = "Tenants",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Tenant ID")),
    request_body = CreateLocationRequest,
    responses(
        (status = 201, description = "Location created", body = ApiResponse<LocationDto>),
        (status = 404, description = "Tenant not found")
    )
)]
pub async fn create_location(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(tenant_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CreateLocationRequest>,
) -> Created<LocationDto> {
    let location = state
        .engine
        .create_location(caller.scope, tenant_id, &request.name)
        .await?;
    created(location.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/locations/{id}/storage-units",
    tag = "Storage Units",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Location ID")),
    responses(
        (status = 200, description = "Units ordered by code", body = ApiResponse<Vec<StorageUnitDto>>)
    )
)]
pub async fn list_storage_units(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(location_id): Path<Uuid>,
) -> ApiResult<Vec<StorageUnitDto>> {
    let units = state.engine.list_storage_units(caller.scope, location_id).await?;
    Ok(Json(ApiResponse::success(
        units.into_iter().map(Into::into).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/locations/{id}/storage-units",
    tag = "Storage Units",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Location ID")),
    request_body = CreateStorageUnitRequest,
    responses(
        (status = 201, description = "Unit created", body = ApiResponse<StorageUnitDto>),
        (status = 409, description = "Code already used at this location")
    )
)]
pub async fn create_storage_unit(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(location_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CreateStorageUnitRequest>,
) -> Created<StorageUnitDto> {
    let unit = state
        .engine
        .create_storage_unit(caller.scope, location_id, &request.code)
        .await?;
    created(unit.into())
}

#[utoipa::path(
    put,
    path = "/api/v1/storage-units/{id}/status",
    tag = "Storage Units",
    security(("api_key" = [])),
    params(("id" = Uuid, Path, description = "Storage unit ID")),
    request_body = UpdateStorageStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<StorageUnitDto>),
        (status = 422, description = "Unknown status")
    )
)]
pub async fn set_storage_status(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateStorageStatusRequest>,
) -> ApiResult<StorageUnitDto> {
    let status = parse_field("status", &request.status, StorageStatus::parse)?;
    let unit = state.engine.set_storage_status(caller.scope, id, status).await?;
    Ok(Json(ApiResponse::success(unit.into())))
}
