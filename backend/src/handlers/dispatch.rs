//! Dispatch handlers

use axum::{extract::State, http::StatusCode, Json};
use shared::DispatchResult;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::dispatch::{DispatchInput, ManualDispatchInput};
use crate::AppState;

/// Dispatch scanned units against an order
pub async fn create_dispatch(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<DispatchInput>,
) -> Result<(StatusCode, Json<DispatchResult>), AppError> {
    if !user.has_permission("dispatch", "write") {
        return Err(AppError::InsufficientPermissions);
    }

    let result = state.dispatches().dispatch(input, &user.username).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn create_manual_dispatch(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<ManualDispatchInput>,
) -> Result<(StatusCode, Json<DispatchResult>), AppError> {
    if !user.has_permission("dispatch", "manual") {
        return Err(AppError::InsufficientPermissions);
    }

    let result = state
        .dispatches()
        .dispatch_manual(input, &user.username)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}
