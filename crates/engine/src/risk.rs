//! Risk engine: loan-to-value of a borrow position and safe collateral bounds.
//!
//! All functions are pure and recompute from the snapshot they are given;
//! prices and balances are volatile, so nothing here is cached.
//!
//! Amounts and prices are human-readable decimals (already divided by the
//! asset decimals). Negative inputs are rejected with `InvalidInput`; zero
//! collateral or a zero collateral price yields an LTV of 0 and nothing
//! withdrawable.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vaultlens_common::config::DEFAULT_WITHDRAW_MARGIN;
use vaultlens_common::error::AppError;
use vaultlens_common::types::{LTV_SCALE, LtvConfig, Percentage};

use crate::fixed_point::{add, div, ensure_non_negative, mul, sub};

/// Balances and prices of a position at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub borrowed_amount: Decimal,
    pub collateral_amount: Decimal,
    pub borrowed_price: Decimal,
    pub collateral_price: Decimal,
}

impl PositionSnapshot {
    pub fn new(
        borrowed_amount: Decimal,
        collateral_amount: Decimal,
        borrowed_price: Decimal,
        collateral_price: Decimal,
    ) -> Result<Self, AppError> {
        let snapshot = Self {
            borrowed_amount,
            collateral_amount,
            borrowed_price,
            collateral_price,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        ensure_non_negative("borrowed_amount", self.borrowed_amount)?;
        ensure_non_negative("collateral_amount", self.collateral_amount)?;
        ensure_non_negative("borrowed_price", self.borrowed_price)?;
        ensure_non_negative("collateral_price", self.collateral_price)?;
        Ok(())
    }

    pub fn borrowed_value(&self) -> Result<Decimal, AppError> {
        mul(self.borrowed_amount, self.borrowed_price, "borrowed value")
    }

    pub fn collateral_value(&self) -> Result<Decimal, AppError> {
        mul(self.collateral_amount, self.collateral_price, "collateral value")
    }

    pub fn ltv(&self) -> Result<Percentage, AppError> {
        current_ltv(
            self.borrowed_amount,
            self.collateral_amount,
            self.borrowed_price,
            self.collateral_price,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollateralAction {
    Add,
    Remove,
}

impl FromStr for CollateralAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(CollateralAction::Add),
            "remove" => Ok(CollateralAction::Remove),
            other => Err(AppError::invalid_input(format!(
                "collateral action must be 'add' or 'remove', got '{other}'"
            ))),
        }
    }
}

/// Where a position's LTV sits relative to its configured bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    /// Below the adjust LTV.
    Healthy,
    /// Between the adjust LTV and the liquidation LTV (inclusive).
    Warning,
    /// Above the liquidation LTV.
    Liquidatable,
}

/// `(borrowed_amount * borrowed_price) / (collateral_amount * collateral_price) * 100`.
///
/// A position without collateral value reports 0 rather than an error.
pub fn current_ltv(
    borrowed_amount: Decimal,
    collateral_amount: Decimal,
    borrowed_price: Decimal,
    collateral_price: Decimal,
) -> Result<Percentage, AppError> {
    let snapshot = PositionSnapshot::new(
        borrowed_amount,
        collateral_amount,
        borrowed_price,
        collateral_price,
    )?;
    if collateral_amount.is_zero() || collateral_price.is_zero() {
        return Ok(Percentage::ZERO);
    }

    let ratio = div(
        snapshot.borrowed_value()?,
        snapshot.collateral_value()?,
        "ltv",
    )?;
    Ok(Percentage::new(
        mul(ratio, Decimal::ONE_HUNDRED, "ltv")?.normalize(),
    ))
}

/// Largest collateral amount that can be removed while the LTV stays below
/// `ltv_config.ltv` by the default margin. See [`RiskEngine::max_withdrawable`].
pub fn max_withdrawable_collateral(
    borrowed_amount: Decimal,
    collateral_amount: Decimal,
    borrowed_price: Decimal,
    collateral_price: Decimal,
    ltv_config: LtvConfig,
) -> Result<Decimal, AppError> {
    let snapshot = PositionSnapshot::new(
        borrowed_amount,
        collateral_amount,
        borrowed_price,
        collateral_price,
    )?;
    RiskEngine::default().max_withdrawable(&snapshot, ltv_config)
}

/// LTV after adding or removing `delta` collateral.
pub fn projected_ltv_after_adjustment(
    snapshot: &PositionSnapshot,
    delta_collateral: Decimal,
    direction: CollateralAction,
) -> Result<Percentage, AppError> {
    ensure_non_negative("delta_collateral", delta_collateral)?;
    let collateral_amount = match direction {
        CollateralAction::Add => add(
            snapshot.collateral_amount,
            delta_collateral,
            "adjusted collateral",
        )?,
        CollateralAction::Remove => {
            if delta_collateral > snapshot.collateral_amount {
                return Err(AppError::invalid_input(format!(
                    "cannot remove {delta_collateral} collateral from a position holding {}",
                    snapshot.collateral_amount
                )));
            }
            sub(
                snapshot.collateral_amount,
                delta_collateral,
                "adjusted collateral",
            )?
        }
    };

    current_ltv(
        snapshot.borrowed_amount,
        collateral_amount,
        snapshot.borrowed_price,
        snapshot.collateral_price,
    )
}

pub fn classify(ltv: Percentage, config: LtvConfig) -> RiskBand {
    if ltv < config.max_ltv() {
        RiskBand::Healthy
    } else if ltv <= config.liquidation_ltv() {
        RiskBand::Warning
    } else {
        RiskBand::Liquidatable
    }
}

/// LTV of a leveraged position where the borrowed value is re-deposited as
/// collateral: `borrowed / (collateral + borrowed) * 100`.
pub fn leverage_ltv(
    borrow_amount: Decimal,
    collateral_amount: Decimal,
    borrow_price: Decimal,
    collateral_price: Decimal,
) -> Result<Percentage, AppError> {
    let snapshot = PositionSnapshot::new(
        borrow_amount,
        collateral_amount,
        borrow_price,
        collateral_price,
    )?;
    let borrowed = snapshot.borrowed_value()?;
    let total = add(snapshot.collateral_value()?, borrowed, "leveraged value")?;
    if total.is_zero() {
        return Ok(Percentage::ZERO);
    }

    let ratio = div(borrowed, total, "leverage ltv")?;
    Ok(Percentage::new(
        mul(ratio, Decimal::ONE_HUNDRED, "leverage ltv")?.normalize(),
    ))
}

/// Amount of the borrowed asset whose value is `leverage` times the value of
/// `collateral_amount`. 0 when either price is 0.
pub fn leverage_borrow_amount(
    collateral_amount: Decimal,
    leverage: Decimal,
    borrow_price: Decimal,
    collateral_price: Decimal,
) -> Result<Decimal, AppError> {
    ensure_non_negative("leverage", leverage)?;
    let snapshot = PositionSnapshot::new(
        Decimal::ZERO,
        collateral_amount,
        borrow_price,
        collateral_price,
    )?;
    if borrow_price.is_zero() || collateral_price.is_zero() {
        return Ok(Decimal::ZERO);
    }

    let target_value = mul(snapshot.collateral_value()?, leverage, "leveraged borrow")?;
    Ok(div(target_value, borrow_price, "leveraged borrow")?.normalize())
}

/// Repay amounts are capped at the outstanding debt.
pub fn clamp_repay(requested: Decimal, outstanding_debt: Decimal) -> Result<Decimal, AppError> {
    ensure_non_negative("requested", requested)?;
    ensure_non_negative("outstanding_debt", outstanding_debt)?;
    Ok(requested.min(outstanding_debt))
}

/// Risk computations parameterised by the withdraw safety margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskEngine {
    withdraw_margin: u32,
}

impl RiskEngine {
    /// `withdraw_margin` is in parts-per-100,000, like [`LtvConfig`], and
    /// must lie in `1..LTV_SCALE`. A zero margin would let a withdrawal land
    /// exactly on the adjust bound.
    pub fn new(withdraw_margin: u32) -> Result<Self, AppError> {
        if withdraw_margin == 0 || withdraw_margin >= LTV_SCALE {
            return Err(AppError::invalid_input(format!(
                "withdraw margin must be between 1 and {}, got {withdraw_margin}",
                LTV_SCALE - 1
            )));
        }
        Ok(Self { withdraw_margin })
    }

    pub fn withdraw_margin(&self) -> u32 {
        self.withdraw_margin
    }

    /// Largest `w` such that removing `w` collateral leaves the LTV at
    /// `ltv_config.ltv - margin`, i.e. strictly under the adjust bound.
    ///
    /// The adjust bound (not the liquidation bound) is used on purpose.
    /// Returns 0 when the position is already at or over the bound, or when
    /// the collateral price is 0.
    pub fn max_withdrawable(
        &self,
        snapshot: &PositionSnapshot,
        ltv_config: LtvConfig,
    ) -> Result<Decimal, AppError> {
        snapshot.validate()?;
        if snapshot.collateral_price.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let borrowed_value = snapshot.borrowed_value()?;
        let bound = ltv_config.ltv() as i64 - self.withdraw_margin as i64;
        if bound <= 0 {
            return Ok(if borrowed_value.is_zero() {
                snapshot.collateral_amount
            } else {
                Decimal::ZERO
            });
        }

        let required_value = div(
            mul(borrowed_value, Decimal::from(LTV_SCALE), "required collateral")?,
            Decimal::from(bound),
            "required collateral",
        )?;
        let required_amount = div(
            required_value,
            snapshot.collateral_price,
            "required collateral",
        )?;
        let withdrawable = sub(
            snapshot.collateral_amount,
            required_amount,
            "withdrawable collateral",
        )?;

        if withdrawable <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        Ok(withdrawable.normalize())
    }

    /// Upper bound for a collateral adjustment: the wallet balance when
    /// adding, the maximum withdrawable amount when removing.
    pub fn max_collateral_adjustment(
        &self,
        snapshot: &PositionSnapshot,
        action: CollateralAction,
        wallet_balance: Decimal,
        ltv_config: LtvConfig,
    ) -> Result<Decimal, AppError> {
        match action {
            CollateralAction::Add => ensure_non_negative("wallet_balance", wallet_balance),
            CollateralAction::Remove => self.max_withdrawable(snapshot, ltv_config),
        }
    }
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self {
            withdraw_margin: DEFAULT_WITHDRAW_MARGIN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn config() -> LtvConfig {
        LtvConfig::new(80_000, 90_000).unwrap()
    }

    #[test]
    fn test_ltv_at_eighty_percent() {
        let ltv = current_ltv(d(80), d(100), d(1), d(1)).unwrap();
        assert_eq!(ltv.value(), d(80));
    }

    #[test]
    fn test_ltv_zero_guards() {
        assert!(current_ltv(d(80), d(0), d(1), d(1)).unwrap().is_zero());
        assert!(current_ltv(d(80), d(100), d(1), d(0)).unwrap().is_zero());
        assert!(current_ltv(d(0), d(100), d(1), d(1)).unwrap().is_zero());
    }

    #[test]
    fn test_ltv_rejects_negative_inputs() {
        let err = current_ltv(d(-1), d(100), d(1), d(1)).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(current_ltv(d(1), d(100), d(1), d(-2)).is_err());
    }

    #[test]
    fn test_nothing_withdrawable_at_boundary() {
        let w = max_withdrawable_collateral(d(80), d(100), d(1), d(1), config()).unwrap();
        assert!(w.is_zero());
    }

    #[test]
    fn test_nothing_withdrawable_over_boundary() {
        let w = max_withdrawable_collateral(d(85), d(100), d(1), d(1), config()).unwrap();
        assert!(w.is_zero());
    }

    #[test]
    fn test_withdrawable_without_collateral_price() {
        let w = max_withdrawable_collateral(d(10), d(100), d(1), d(0), config()).unwrap();
        assert!(w.is_zero());
    }

    #[test]
    fn test_everything_withdrawable_without_debt() {
        let w = max_withdrawable_collateral(d(0), d(100), d(1), d(3), config()).unwrap();
        assert_eq!(w, d(100));
    }

    #[test]
    fn test_withdrawable_matches_closed_form() {
        // 50 / (80% - 0.01%) = 62.5078...; the rest can go.
        let w = max_withdrawable_collateral(d(50), d(100), d(1), d(1), config()).unwrap();
        let expected = d(100) - d(50) * d(100_000) / d(79_990);
        assert_eq!(w, expected.normalize());
    }

    #[test]
    fn test_custom_margin() {
        let engine = RiskEngine::new(1).unwrap();
        let snapshot = PositionSnapshot::new(d(40), d(100), d(1), d(1)).unwrap();
        // 40 / (80% - 0.001%)
        let expected = d(100) - d(40) * d(100_000) / d(79_999);
        assert_eq!(
            engine.max_withdrawable(&snapshot, config()).unwrap(),
            expected.normalize()
        );
        assert!(RiskEngine::new(LTV_SCALE).is_err());
    }

    #[test]
    fn test_zero_margin_rejected() {
        assert!(matches!(RiskEngine::new(0), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_smallest_margin_stays_below_bound() {
        let engine = RiskEngine::new(1).unwrap();
        let snapshot = PositionSnapshot::new(d(40), d(100), d(1), d(1)).unwrap();
        let w = engine.max_withdrawable(&snapshot, config()).unwrap();
        let projected =
            projected_ltv_after_adjustment(&snapshot, w, CollateralAction::Remove).unwrap();
        assert!(projected < config().max_ltv());
    }

    #[test]
    fn test_margin_consuming_whole_bound() {
        let engine = RiskEngine::new(80_000).unwrap();
        let with_debt = PositionSnapshot::new(d(1), d(100), d(1), d(1)).unwrap();
        let without_debt = PositionSnapshot::new(d(0), d(100), d(1), d(1)).unwrap();
        assert!(engine.max_withdrawable(&with_debt, config()).unwrap().is_zero());
        assert_eq!(
            engine.max_withdrawable(&without_debt, config()).unwrap(),
            d(100)
        );
    }

    #[test]
    fn test_projected_ltv() {
        let snapshot = PositionSnapshot::new(d(50), d(100), d(1), d(1)).unwrap();
        let added = projected_ltv_after_adjustment(&snapshot, d(25), CollateralAction::Add).unwrap();
        assert_eq!(added.value(), d(40));
        let removed =
            projected_ltv_after_adjustment(&snapshot, d(50), CollateralAction::Remove).unwrap();
        assert_eq!(removed.value(), d(100));
        let emptied =
            projected_ltv_after_adjustment(&snapshot, d(100), CollateralAction::Remove).unwrap();
        assert!(emptied.is_zero());
    }

    #[test]
    fn test_projected_ltv_rejects_overdraw() {
        let snapshot = PositionSnapshot::new(d(50), d(100), d(1), d(1)).unwrap();
        let err =
            projected_ltv_after_adjustment(&snapshot, d(101), CollateralAction::Remove).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_classify_bands() {
        assert_eq!(classify(Percentage::new(d(79)), config()), RiskBand::Healthy);
        assert_eq!(classify(Percentage::new(d(80)), config()), RiskBand::Warning);
        assert_eq!(classify(Percentage::new(d(90)), config()), RiskBand::Warning);
        assert_eq!(
            classify(Percentage::new(d(91)), config()),
            RiskBand::Liquidatable
        );
    }

    #[test]
    fn test_leverage_ltv() {
        let ltv = leverage_ltv(d(300), d(100), d(1), d(1)).unwrap();
        assert_eq!(ltv.value(), d(75));
        assert!(leverage_ltv(d(0), d(0), d(1), d(1)).unwrap().is_zero());
    }

    #[test]
    fn test_leverage_borrow_amount() {
        // 100 collateral at 2 with 3x leverage is 600 of value, 150 units at 4.
        assert_eq!(leverage_borrow_amount(d(100), d(3), d(4), d(2)).unwrap(), d(150));
        assert!(leverage_borrow_amount(d(100), d(3), d(0), d(2)).unwrap().is_zero());
        assert!(leverage_borrow_amount(d(100), d(-1), d(4), d(2)).is_err());

        let borrow = leverage_borrow_amount(d(100), d(3), d(1), d(1)).unwrap();
        assert_eq!(leverage_ltv(borrow, d(100), d(1), d(1)).unwrap().value(), d(75));
    }

    #[test]
    fn test_clamp_repay() {
        assert_eq!(clamp_repay(d(10), d(4)).unwrap(), d(4));
        assert_eq!(clamp_repay(d(3), d(4)).unwrap(), d(3));
        assert!(clamp_repay(d(-3), d(4)).is_err());
    }

    #[test]
    fn test_max_collateral_adjustment() {
        let engine = RiskEngine::default();
        let snapshot = PositionSnapshot::new(d(80), d(100), d(1), d(1)).unwrap();
        assert_eq!(
            engine
                .max_collateral_adjustment(&snapshot, CollateralAction::Add, d(7), config())
                .unwrap(),
            d(7)
        );
        assert!(engine
            .max_collateral_adjustment(&snapshot, CollateralAction::Remove, d(7), config())
            .unwrap()
            .is_zero());
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("add".parse::<CollateralAction>().unwrap(), CollateralAction::Add);
        assert_eq!(
            "remove".parse::<CollateralAction>().unwrap(),
            CollateralAction::Remove
        );
        assert!("withdraw".parse::<CollateralAction>().is_err());
    }
}
