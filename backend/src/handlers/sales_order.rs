//! Sales order handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use shared::{
    DispatchWithDetails, PaginatedResponse, Pagination, SalesOrder, SalesOrderStatus,
    SalesOrderWithLines,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::sales_order::CreateSalesOrderInput;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OrderStatusQuery {
    pub status: Option<SalesOrderStatus>,
}

#[derive(Serialize)]
pub struct OrderDispatchesResponse {
    pub dispatches: Vec<DispatchWithDetails>,
}

pub async fn create_sales_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateSalesOrderInput>,
) -> Result<(StatusCode, Json<SalesOrderWithLines>), AppError> {
    if !user.has_permission("sales_orders", "write") {
        return Err(AppError::InsufficientPermissions);
    }

    let order = state.sales_orders().create(input, &user.username).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Orders filtered by `?status=open|complete`
pub async fn list_sales_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<OrderStatusQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<SalesOrder>>, AppError> {
    if !user.has_permission("sales_orders", "view") {
        return Err(AppError::InsufficientPermissions);
    }

    let page = state
        .sales_orders()
        .list_by_state(query.status, pagination)
        .await?;
    Ok(Json(page))
}

pub async fn get_sales_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<SalesOrderWithLines>, AppError> {
    if !user.has_permission("sales_orders", "view") {
        return Err(AppError::InsufficientPermissions);
    }

    let order = state.sales_orders().get(order_id).await?;
    Ok(Json(order))
}

pub async fn delete_sales_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !user.has_permission("sales_orders", "write") {
        return Err(AppError::InsufficientPermissions);
    }

    state.sales_orders().delete(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Dispatch history of one order with its details
pub async fn list_order_dispatches(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDispatchesResponse>, AppError> {
    if !user.has_any_permission(&[("dispatch", "view"), ("sales_orders", "view")]) {
        return Err(AppError::InsufficientPermissions);
    }

    let dispatches = state.dispatches().dispatches_for_order(order_id).await?;
    Ok(Json(OrderDispatchesResponse { dispatches }))
}
