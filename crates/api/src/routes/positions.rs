//! Borrow position routes: risk view and adjustment previews.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

use vaultlens_common::error::AppError;
use vaultlens_common::types::AccountAddress;

use crate::state::AppState;
use crate::views::{
    AdjustmentParams, AdjustmentPreview, PositionService, PositionView, RepayParams, RepayPreview,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/positions/{address}", get(get_position))
        .route("/api/positions/{address}/preview", get(preview_adjustment))
        .route("/api/positions/{address}/repay-preview", get(preview_repay))
}

pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(params)| params)
        .map_err(|e| AppError::invalid_input(e.body_text()))
}

/// GET /api/positions/:address — Amounts, prices, LTV and withdraw headroom.
async fn get_position(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<PositionView>, AppError> {
    let position: AccountAddress = address.parse()?;
    let view = PositionService::view(&state, position).await?;
    Ok(Json(view))
}

/// GET /api/positions/:address/preview?action=add|remove&amount=X
async fn preview_adjustment(
    State(state): State<AppState>,
    Path(address): Path<String>,
    query: Result<Query<AdjustmentParams>, QueryRejection>,
) -> Result<Json<AdjustmentPreview>, AppError> {
    let position: AccountAddress = address.parse()?;
    let params = query_params(query)?;
    let preview = PositionService::preview_adjustment(&state, position, params).await?;
    Ok(Json(preview))
}

/// GET /api/positions/:address/repay-preview?amount=X
async fn preview_repay(
    State(state): State<AppState>,
    Path(address): Path<String>,
    query: Result<Query<RepayParams>, QueryRejection>,
) -> Result<Json<RepayPreview>, AppError> {
    let position: AccountAddress = address.parse()?;
    let params = query_params(query)?;
    let preview = PositionService::preview_repay(&state, position, params).await?;
    Ok(Json(preview))
}
