//! Daily report handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use shared::{BaggedUnit, DailyReport, DailyReportDetail, PaginatedResponse, Pagination};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::daily_report::{CreateDailyReportInput, UpdateDailyReportInput};
use crate::AppState;

/// `?claim=false` creates the report without absorbing pending units
#[derive(Debug, Deserialize)]
pub struct CreateReportQuery {
    #[serde(default = "default_claim")]
    pub claim: bool,
}

fn default_claim() -> bool {
    true
}

#[derive(Serialize)]
pub struct ClaimedUnitsResponse {
    pub claimed: usize,
    pub units: Vec<BaggedUnit>,
}

pub async fn create_daily_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<CreateReportQuery>,
    Json(input): Json<CreateDailyReportInput>,
) -> Result<(StatusCode, Json<DailyReportDetail>), AppError> {
    if !user.has_permission("daily_reports", "write") {
        return Err(AppError::InsufficientPermissions);
    }

    let service = state.daily_reports();
    let detail = if query.claim {
        service.create(input, &user.username).await?
    } else {
        service.create_without_claim(input, &user.username).await?
    };
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn list_daily_reports(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<DailyReport>>, AppError> {
    if !user.has_permission("daily_reports", "view") {
        return Err(AppError::InsufficientPermissions);
    }

    let page = state.daily_reports().list(pagination).await?;
    Ok(Json(page))
}

pub async fn get_daily_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(report_id): Path<Uuid>,
) -> Result<Json<DailyReportDetail>, AppError> {
    if !user.has_permission("daily_reports", "view") {
        return Err(AppError::InsufficientPermissions);
    }

    let detail = state.daily_reports().get(report_id).await?;
    Ok(Json(detail))
}

pub async fn update_daily_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(report_id): Path<Uuid>,
    Json(input): Json<UpdateDailyReportInput>,
) -> Result<Json<DailyReportDetail>, AppError> {
    if !user.has_permission("daily_reports", "write") {
        return Err(AppError::InsufficientPermissions);
    }

    let detail = state.daily_reports().update(report_id, input).await?;
    Ok(Json(detail))
}

pub async fn delete_daily_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(report_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !user.has_permission("daily_reports", "write") {
        return Err(AppError::InsufficientPermissions);
    }

    state.daily_reports().delete(report_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Approve a pending report; the approver is the authenticated user
pub async fn approve_daily_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(report_id): Path<Uuid>,
) -> Result<Json<DailyReport>, AppError> {
    if !user.has_permission("daily_reports", "approve") {
        return Err(AppError::InsufficientPermissions);
    }

    let report = state
        .daily_reports()
        .approve(report_id, &user.username)
        .await?;
    Ok(Json(report))
}

/// Absorb every unit produced since the last report
pub async fn claim_units(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(report_id): Path<Uuid>,
) -> Result<Json<ClaimedUnitsResponse>, AppError> {
    if !user.has_permission("daily_reports", "write") {
        return Err(AppError::InsufficientPermissions);
    }

    let units = state
        .daily_reports()
        .claim_all_unassociated(report_id)
        .await?;
    Ok(Json(ClaimedUnitsResponse {
        claimed: units.len(),
        units,
    }))
}

pub async fn associate_unit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((report_id, code)): Path<(Uuid, String)>,
) -> Result<Json<BaggedUnit>, AppError> {
    if !user.has_permission("daily_reports", "write") {
        return Err(AppError::InsufficientPermissions);
    }

    let unit = state.daily_reports().associate(report_id, &code).await?;
    Ok(Json(unit))
}

pub async fn disassociate_unit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((report_id, code)): Path<(Uuid, String)>,
) -> Result<Json<BaggedUnit>, AppError> {
    if !user.has_permission("daily_reports", "write") {
        return Err(AppError::InsufficientPermissions);
    }

    let unit = state.daily_reports().disassociate(report_id, &code).await?;
    Ok(Json(unit))
}
