//! Stock ledger handlers: goods, kits and the movement history

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    Good, ItemKind, KitWithStock, MovementFilter, MovementResult, PaginatedResponse, Pagination,
    StockMovement,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{AuthUser, CurrentUser};
use crate::services::stock::{AdjustStockInput, CreateGoodInput, CreateKitInput, MovementActor};
use crate::AppState;

#[derive(Serialize)]
pub struct StockResponse {
    pub item_kind: ItemKind,
    pub item_id: Uuid,
    pub stock: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub quantity: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct DeltaRequest {
    pub delta: Decimal,
}

/// Adjustment body; `responsible` defaults to the authenticated user
#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    #[serde(flatten)]
    pub input: AdjustStockInput,
    #[serde(default)]
    pub responsible: Option<String>,
}

/// Ledger operations are attributed to the authenticated user
fn ledger_actor(user: &AuthUser) -> MovementActor<'_> {
    MovementActor {
        responsible: &user.username,
        system_user: &user.username,
    }
}

pub async fn create_good(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateGoodInput>,
) -> Result<(StatusCode, Json<Good>), AppError> {
    if !user.has_permission("stock", "write") {
        return Err(AppError::InsufficientPermissions);
    }

    let good = state.stock().create_good(input).await?;
    Ok((StatusCode::CREATED, Json(good)))
}

pub async fn list_goods(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<Good>>, AppError> {
    if !user.has_permission("stock", "view") {
        return Err(AppError::InsufficientPermissions);
    }

    let page = state.stock().list_goods(pagination).await?;
    Ok(Json(page))
}

pub async fn get_good(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(good_id): Path<Uuid>,
) -> Result<Json<Good>, AppError> {
    if !user.has_permission("stock", "view") {
        return Err(AppError::InsufficientPermissions);
    }

    let good = state.stock().get_good(good_id).await?;
    Ok(Json(good))
}

pub async fn get_good_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(good_id): Path<Uuid>,
) -> Result<Json<StockResponse>, AppError> {
    if !user.has_permission("stock", "view") {
        return Err(AppError::InsufficientPermissions);
    }

    let stock = state.stock().get_stock(ItemKind::Good, good_id).await?;
    Ok(Json(StockResponse {
        item_kind: ItemKind::Good,
        item_id: good_id,
        stock,
    }))
}

/// Overwrite the stored stock of a good; the difference is recorded as an adjustment
pub async fn set_good_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(good_id): Path<Uuid>,
    Json(body): Json<SetStockRequest>,
) -> Result<Json<Good>, AppError> {
    if !user.has_permission("stock", "adjust") {
        return Err(AppError::InsufficientPermissions);
    }

    let good = state.stock().set_stock(good_id, body.quantity, ledger_actor(&user)).await?;
    Ok(Json(good))
}

pub async fn increment_good_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(good_id): Path<Uuid>,
    Json(body): Json<DeltaRequest>,
) -> Result<Json<StockResponse>, AppError> {
    if !user.has_permission("stock", "adjust") {
        return Err(AppError::InsufficientPermissions);
    }

    let stock = state.stock().increment(good_id, body.delta, ledger_actor(&user)).await?;
    Ok(Json(StockResponse {
        item_kind: ItemKind::Good,
        item_id: good_id,
        stock,
    }))
}

pub async fn decrement_good_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(good_id): Path<Uuid>,
    Json(body): Json<DeltaRequest>,
) -> Result<Json<StockResponse>, AppError> {
    if !user.has_permission("stock", "adjust") {
        return Err(AppError::InsufficientPermissions);
    }

    let stock = state.stock().decrement(good_id, body.delta, ledger_actor(&user)).await?;
    Ok(Json(StockResponse {
        item_kind: ItemKind::Good,
        item_id: good_id,
        stock,
    }))
}

pub async fn create_kit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateKitInput>,
) -> Result<(StatusCode, Json<KitWithStock>), AppError> {
    if !user.has_permission("stock", "write") {
        return Err(AppError::InsufficientPermissions);
    }

    let kit = state.stock().create_kit(input).await?;
    Ok((StatusCode::CREATED, Json(kit)))
}

/// Kit with components and its derived stock
pub async fn get_kit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(kit_id): Path<Uuid>,
) -> Result<Json<KitWithStock>, AppError> {
    if !user.has_permission("stock", "view") {
        return Err(AppError::InsufficientPermissions);
    }

    let kit = state.stock().get_kit(kit_id).await?;
    Ok(Json(kit))
}

pub async fn get_kit_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(kit_id): Path<Uuid>,
) -> Result<Json<StockResponse>, AppError> {
    if !user.has_permission("stock", "view") {
        return Err(AppError::InsufficientPermissions);
    }

    let stock = state.stock().kit_available_stock(kit_id).await?;
    Ok(Json(StockResponse {
        item_kind: ItemKind::Kit,
        item_id: kit_id,
        stock,
    }))
}

/// Record a stock movement for a good or a kit
pub async fn adjust_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<AdjustStockRequest>,
) -> Result<(StatusCode, Json<MovementResult>), AppError> {
    if !user.has_permission("stock", "adjust") {
        return Err(AppError::InsufficientPermissions);
    }

    let responsible = body.responsible.as_deref().unwrap_or(&user.username);
    let actor = MovementActor {
        responsible,
        system_user: &user.username,
    };
    let result = state.stock().adjust(body.input, actor).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Movement history filtered by kind, item and inclusive date range
pub async fn list_movements(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<MovementFilter>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<StockMovement>>, AppError> {
    if !user.has_permission("stock", "view") {
        return Err(AppError::InsufficientPermissions);
    }

    let page = state.stock().history(filter, pagination).await?;
    Ok(Json(page))
}
