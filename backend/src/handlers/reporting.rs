//! Operating-day reports

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared::operating_day::{operating_day_of, OperatingWindow};
use shared::{DispatchedProductTotal, ProductionTotal, StockSnapshotEntry};

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::AppState;

#[derive(Deserialize)]
pub struct ReportQuery {
    /// Operating day; defaults to the one in progress
    pub date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct DayReport<T> {
    pub date: NaiveDate,
    pub window: OperatingWindow,
    pub rows: Vec<T>,
}

fn resolve_day(state: &AppState, query: &ReportQuery) -> NaiveDate {
    query
        .date
        .unwrap_or_else(|| operating_day_of(state.clock.now()))
}

/// Units and kilograms dispatched per product
pub async fn get_dispatched_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<DayReport<DispatchedProductTotal>>> {
    if !user.has_permission("reports", "view") {
        return Err(AppError::InsufficientPermissions);
    }

    let date = resolve_day(&state, &query);
    let rows = state.dispatches().dispatched_by_product(date).await?;
    Ok(Json(DayReport {
        date,
        window: OperatingWindow::for_date(date),
        rows,
    }))
}

/// Units and kilograms produced per product
pub async fn get_production_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<DayReport<ProductionTotal>>> {
    if !user.has_permission("reports", "view") {
        return Err(AppError::InsufficientPermissions);
    }

    let date = resolve_day(&state, &query);
    let rows = state.bagged_units().produced_by_product(date).await?;
    Ok(Json(DayReport {
        date,
        window: OperatingWindow::for_date(date),
        rows,
    }))
}

/// Stock of every good at the close of the operating day
pub async fn get_stock_snapshot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<DayReport<StockSnapshotEntry>>> {
    if !user.has_permission("reports", "view") {
        return Err(AppError::InsufficientPermissions);
    }

    let date = resolve_day(&state, &query);
    let rows = state.stock().stock_snapshot(date).await?;
    Ok(Json(DayReport {
        date,
        window: OperatingWindow::for_date(date),
        rows,
    }))
}
