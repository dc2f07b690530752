//! Interest model: annualised yields and utilization from raw vault reserves.
//!
//! The protocol reports a per-second compounding rate as a 64.64 fixed-point
//! fraction. Annualising it means raising a value within ~1e-9 of 1 to the
//! 31,536,000th power, which `f64` cannot do without visible error, so the
//! exponentiation runs on 28-digit decimals by repeated squaring.

use alloy::primitives::U256;
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

use vaultlens_common::error::AppError;
use vaultlens_common::types::{FixedPointRate, Percentage};

use crate::fixed_point::{self, SECONDS_PER_YEAR};

/// Fractional digits kept when converting the integer utilization ratio.
const UTILIZATION_SCALE: u32 = 18;

/// Rates shown for a vault: how much of the pool is lent out, what
/// borrowers pay and what suppliers earn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRates {
    pub utilization: Percentage,
    pub borrow_apy: Percentage,
    pub supply_apy: Percentage,
}

impl VaultRates {
    pub fn compute(
        rate: FixedPointRate,
        cash: u128,
        total_borrows: u128,
    ) -> Result<Self, AppError> {
        let utilization = InterestModel::utilization(cash, total_borrows);
        let borrow_apy = InterestModel::borrow_apy(rate)?;
        let supply_apy = InterestModel::supply_apy_from(borrow_apy, utilization)?;
        Ok(Self {
            utilization,
            borrow_apy,
            supply_apy,
        })
    }
}

/// Stateless conversions from protocol rates to user-facing percentages.
pub struct InterestModel;

impl InterestModel {
    /// Annual percentage yield of a per-second compounding rate:
    /// `((1 + raw / 2^64) ^ SECONDS_PER_YEAR - 1) * 100`.
    ///
    /// Returns `Overflow` for rates whose compounded value leaves the
    /// decimal range (an APY beyond ~1e28 %).
    pub fn borrow_apy(rate: FixedPointRate) -> Result<Percentage, AppError> {
        if rate.is_zero() {
            return Ok(Percentage::ZERO);
        }

        let growth = fixed_point::per_second_growth(rate)?;
        let multiplier = fixed_point::add(Decimal::ONE, growth, "per-second multiplier")?;
        let compounded = multiplier.checked_powu(SECONDS_PER_YEAR).ok_or_else(|| {
            AppError::overflow(format!(
                "compounding rate {} over one year exceeds decimal range",
                rate.raw()
            ))
        })?;

        let apy = fixed_point::mul(
            fixed_point::sub(compounded, Decimal::ONE, "annual growth")?,
            Decimal::ONE_HUNDRED,
            "annual growth",
        )?;
        Ok(Percentage::new(apy.normalize()))
    }

    /// Share of reserves currently lent out: `total_borrows * 100 / (cash + total_borrows)`,
    /// or `0` for an empty pool.
    ///
    /// Computed on 256-bit integers, so reserves anywhere in the `u128`
    /// range neither overflow nor lose precision before the final scaling.
    pub fn utilization(cash: u128, total_borrows: u128) -> Percentage {
        let borrows = U256::from(total_borrows);
        let total = U256::from(cash) + borrows;
        if total.is_zero() {
            return Percentage::ZERO;
        }

        let one_hundred = U256::from(100u128 * 10u128.pow(UTILIZATION_SCALE));
        // borrows <= total, so the quotient never exceeds 100 * 10^18.
        let scaled = (borrows * one_hundred / total).min(one_hundred).to::<i128>();
        Percentage::new(Decimal::from_i128_with_scale(scaled, UTILIZATION_SCALE).normalize())
    }

    /// Yield earned by suppliers: `borrow_apy * utilization / 100`.
    pub fn supply_apy(
        rate: FixedPointRate,
        cash: u128,
        total_borrows: u128,
    ) -> Result<Percentage, AppError> {
        let borrow_apy = Self::borrow_apy(rate)?;
        Self::supply_apy_from(borrow_apy, Self::utilization(cash, total_borrows))
    }

    /// Supply APY from an already computed borrow APY and utilization.
    pub fn supply_apy_from(
        borrow_apy: Percentage,
        utilization: Percentage,
    ) -> Result<Percentage, AppError> {
        let share = fixed_point::div(utilization.value(), Decimal::ONE_HUNDRED, "utilization")?;
        let apy = fixed_point::mul(borrow_apy.value(), share, "supply apy")?;
        Ok(Percentage::new(apy.normalize()))
    }
}
