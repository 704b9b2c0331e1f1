//! Bagged unit handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use shared::{BaggedUnit, BaggedUnitFilter, PaginatedResponse, Pagination, UnitDispatchStatus};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::bagged_unit::CreateBaggedUnitInput;
use crate::AppState;

#[derive(Serialize)]
pub struct BaggedUnitsResponse {
    pub units: Vec<BaggedUnit>,
}

/// Register a produced unit; the operator becomes the responsible
pub async fn create_bagged_unit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateBaggedUnitInput>,
) -> Result<(StatusCode, Json<BaggedUnit>), AppError> {
    if !user.has_permission("bagged_units", "write") {
        return Err(AppError::InsufficientPermissions);
    }

    let unit = state.bagged_units().create(input, &user.username).await?;
    Ok((StatusCode::CREATED, Json(unit)))
}

pub async fn list_bagged_units(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<BaggedUnitFilter>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<BaggedUnit>>, AppError> {
    if !user.has_permission("bagged_units", "view") {
        return Err(AppError::InsufficientPermissions);
    }

    let page = state.bagged_units().list(filter, pagination).await?;
    Ok(Json(page))
}

/// Units waiting for the next daily report
pub async fn list_unassociated_units(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<BaggedUnitsResponse>, AppError> {
    if !user.has_permission("bagged_units", "view") {
        return Err(AppError::InsufficientPermissions);
    }

    let units = state.bagged_units().list_unassociated().await?;
    Ok(Json(BaggedUnitsResponse { units }))
}

pub async fn get_bagged_unit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(code): Path<String>,
) -> Result<Json<BaggedUnit>, AppError> {
    if !user.has_permission("bagged_units", "view") {
        return Err(AppError::InsufficientPermissions);
    }

    let unit = state.bagged_units().get(&code).await?;
    Ok(Json(unit))
}

pub async fn delete_bagged_unit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    if !user.has_permission("bagged_units", "write") {
        return Err(AppError::InsufficientPermissions);
    }

    state.bagged_units().delete(&code).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Check a code before scanning it into a dispatch
pub async fn get_unit_dispatch_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(code): Path<String>,
) -> Result<Json<UnitDispatchStatus>, AppError> {
    if !user.has_any_permission(&[("dispatch", "view"), ("bagged_units", "view")]) {
        return Err(AppError::InsufficientPermissions);
    }

    let status = state.dispatches().unit_dispatch_status(&code).await?;
    Ok(Json(status))
}
