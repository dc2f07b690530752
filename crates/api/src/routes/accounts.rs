//! Account routes.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use vaultlens_common::error::AppError;
use vaultlens_common::types::AccountAddress;

use crate::state::AppState;
use crate::views::{AccountPositions, AccountService};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/accounts/{owner}/positions", get(list_positions))
}

/// GET /api/accounts/:owner/positions — Borrow positions opened by an account.
async fn list_positions(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<AccountPositions>, AppError> {
    let owner: AccountAddress = owner.parse()?;
    let positions = AccountService::positions(&state, owner).await?;
    Ok(Json(positions))
}
