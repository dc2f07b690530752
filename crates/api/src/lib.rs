//! HTTP presentation layer: vault rates, position risk and adjustment previews.

pub mod routes;
pub mod state;
pub mod views;
