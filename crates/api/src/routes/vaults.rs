//! Vault listing and detail routes.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

use vaultlens_common::error::AppError;
use vaultlens_common::types::VaultAddress;

use crate::state::AppState;
use crate::routes::positions::query_params;
use crate::views::{
    CollateralView, LeverageParams, LeveragePreview, VaultDetail, VaultService, VaultSummary,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/vaults", get(list_vaults))
        .route("/api/vaults/{address}", get(get_vault))
        .route("/api/vaults/{address}/collaterals", get(list_collaterals))
        .route("/api/vaults/{address}/leverage-preview", get(preview_leverage))
}

/// GET /api/vaults — Every registered vault with utilization and APYs.
async fn list_vaults(State(state): State<AppState>) -> Result<Json<Vec<VaultSummary>>, AppError> {
    let vaults = VaultService::list(&state).await?;
    Ok(Json(vaults))
}

/// GET /api/vaults/:address — Vault metadata, reserves and rates.
async fn get_vault(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<VaultDetail>, AppError> {
    let vault: VaultAddress = address.parse()?;
    let detail = VaultService::detail(&state, vault).await?;
    Ok(Json(detail))
}

/// GET /api/vaults/:address/collaterals — Accepted collaterals with LTV bounds and prices.
async fn list_collaterals(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<CollateralView>>, AppError> {
    let vault: VaultAddress = address.parse()?;
    let collaterals = VaultService::collaterals(&state, vault).await?;
    Ok(Json(collaterals))
}

/// GET /api/vaults/:address/leverage-preview?collateral=0x..&collateral_amount=X&leverage=N
async fn preview_leverage(
    State(state): State<AppState>,
    Path(address): Path<String>,
    query: Result<Query<LeverageParams>, QueryRejection>,
) -> Result<Json<LeveragePreview>, AppError> {
    let vault: VaultAddress = address.parse()?;
    let params = query_params(query)?;
    let preview = VaultService::leverage_preview(&state, vault, params).await?;
    Ok(Json(preview))
}
