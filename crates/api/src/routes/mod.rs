pub mod accounts;
pub mod health;
pub mod positions;
pub mod vaults;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(vaults::router())
        .merge(positions::router())
        .merge(accounts::router())
        .with_state(state)
}
