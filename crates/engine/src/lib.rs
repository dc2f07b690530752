//! Pure financial math for lending vaults.
//!
//! Nothing in this crate performs I/O or touches the metadata cache; every
//! function is a deterministic function of plain numeric inputs.

pub mod fixed_point;
pub mod interest;
pub mod risk;
pub mod units;

pub use interest::{InterestModel, VaultRates};
pub use risk::{CollateralAction, PositionSnapshot, RiskBand, RiskEngine};
