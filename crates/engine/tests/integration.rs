//! Integration tests for the interest and risk math.
//!
//! Everything here is pure, so the tests sweep small grids of inputs and
//! check the relationships between the functions rather than single values.

use rust_decimal::Decimal;

use vaultlens_common::types::{FixedPointRate, LtvConfig, Percentage};
use vaultlens_engine::risk::{
    current_ltv, max_withdrawable_collateral, projected_ltv_after_adjustment,
};
use vaultlens_engine::{CollateralAction, InterestModel, PositionSnapshot, RiskEngine, VaultRates};

// ============================================================
// Shared helpers
// ============================================================

fn d(value: i64) -> Decimal {
    Decimal::from(value)
}

fn adjust_80_liquidate_90() -> LtvConfig {
    LtvConfig::new(80_000, 90_000).unwrap()
}

/// Per-second rates spanning ~1e-10% to ~12% APY.
fn rate_ladder() -> Vec<FixedPointRate> {
    [1u128, 1 << 10, 1 << 20, 1 << 28, 1 << 32, 1 << 35, 1 << 36]
        .into_iter()
        .map(FixedPointRate)
        .collect()
}

// ============================================================
// Interest model
// ============================================================

#[test]
fn test_borrow_apy_monotonic_in_rate() {
    let apys: Vec<Percentage> = rate_ladder()
        .into_iter()
        .map(|rate| InterestModel::borrow_apy(rate).unwrap())
        .collect();

    for pair in apys.windows(2) {
        assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
    }
}

#[test]
fn test_supply_never_exceeds_borrow() {
    let splits = [(1_000u128, 0u128), (900, 100), (500, 500), (1, 999_999), (0, 42)];

    for rate in rate_ladder() {
        let borrow = InterestModel::borrow_apy(rate).unwrap();
        for (cash, borrows) in splits {
            let supply = InterestModel::supply_apy(rate, cash, borrows).unwrap();
            assert!(supply <= borrow, "cash={cash} borrows={borrows}");
            if cash == 0 {
                assert_eq!(supply, borrow);
            } else {
                assert!(supply < borrow);
            }
        }
    }
}

#[test]
fn test_zero_rate_scenario() {
    for (cash, borrows) in [(0u128, 0u128), (250, 750), (0, 10), (10, 0)] {
        let rates = VaultRates::compute(FixedPointRate::ZERO, cash, borrows).unwrap();
        assert!(rates.borrow_apy.is_zero());
        assert!(rates.supply_apy.is_zero());
    }
}

#[test]
fn test_utilization_scenario() {
    assert_eq!(InterestModel::utilization(250, 750).value(), d(75));
    assert_eq!(InterestModel::utilization(0, 0), Percentage::ZERO);
    assert_eq!(InterestModel::utilization(5, 0), Percentage::ZERO);
    assert_eq!(InterestModel::utilization(0, 5), Percentage::HUNDRED);
}

#[test]
fn test_vault_rates_serialize_as_decimal_strings() {
    let rates = VaultRates::compute(FixedPointRate::ZERO, 250, 750).unwrap();
    let json = serde_json::to_value(rates).unwrap();
    assert_eq!(json["utilization"], "75");
    assert_eq!(json["borrow_apy"], "0");
}

// ============================================================
// Risk engine
// ============================================================

#[test]
fn test_ltv_zero_without_debt() {
    for collateral in [1, 10, 1_000] {
        assert!(current_ltv(d(0), d(collateral), d(3), d(7)).unwrap().is_zero());
    }
}

#[test]
fn test_ltv_monotonic_in_borrowed() {
    let mut previous = Percentage::ZERO;
    for borrowed in [1, 5, 20, 80, 150] {
        let ltv = current_ltv(d(borrowed), d(100), d(2), d(3)).unwrap();
        assert!(ltv > previous);
        previous = ltv;
    }
}

#[test]
fn test_ltv_decreasing_in_collateral() {
    let mut previous = current_ltv(d(50), d(1), d(1), d(1)).unwrap();
    for collateral in [2, 10, 60, 500] {
        let ltv = current_ltv(d(50), d(collateral), d(1), d(1)).unwrap();
        assert!(ltv < previous);
        previous = ltv;
    }
}

#[test]
fn test_boundary_scenario() {
    let config = adjust_80_liquidate_90();
    assert_eq!(current_ltv(d(80), d(100), d(1), d(1)).unwrap().value(), d(80));
    assert!(
        max_withdrawable_collateral(d(80), d(100), d(1), d(1), config)
            .unwrap()
            .is_zero()
    );
}

#[test]
fn test_withdraw_round_trip_stays_under_bound() {
    let config = adjust_80_liquidate_90();
    let bound = config.max_ltv().value();
    // One margin below the bound: 10 / 100,000 = 0.01 percentage points.
    let floor = bound - Decimal::new(1, 2) - Decimal::new(1, 6);

    for (borrowed, collateral, borrowed_price, collateral_price) in
        [(50, 100, 1, 1), (10, 40, 3, 2), (1, 1_000, 7, 1)]
    {
        let snapshot = PositionSnapshot::new(
            d(borrowed),
            d(collateral),
            d(borrowed_price),
            d(collateral_price),
        )
        .unwrap();
        let withdrawable = max_withdrawable_collateral(
            snapshot.borrowed_amount,
            snapshot.collateral_amount,
            snapshot.borrowed_price,
            snapshot.collateral_price,
            config,
        )
        .unwrap();
        assert!(withdrawable > Decimal::ZERO);

        let projected =
            projected_ltv_after_adjustment(&snapshot, withdrawable, CollateralAction::Remove)
                .unwrap();
        assert!(projected.value() < bound, "projected {projected}");
        assert!(projected.value() >= floor, "projected {projected}");
    }
}

#[test]
fn test_wider_margin_withdraws_less() {
    let config = adjust_80_liquidate_90();
    let snapshot = PositionSnapshot::new(d(50), d(100), d(1), d(1)).unwrap();

    let narrow = RiskEngine::new(10).unwrap().max_withdrawable(&snapshot, config).unwrap();
    let wide = RiskEngine::new(1_000).unwrap().max_withdrawable(&snapshot, config).unwrap();
    assert!(wide < narrow);
}

#[test]
fn test_add_then_remove_restores_ltv() {
    let snapshot = PositionSnapshot::new(d(30), d(90), d(2), d(1)).unwrap();
    let added = projected_ltv_after_adjustment(&snapshot, d(10), CollateralAction::Add).unwrap();

    let grown = PositionSnapshot::new(d(30), d(100), d(2), d(1)).unwrap();
    let restored =
        projected_ltv_after_adjustment(&grown, d(10), CollateralAction::Remove).unwrap();

    assert_eq!(added, grown.ltv().unwrap());
    assert_eq!(restored, snapshot.ltv().unwrap());
}

#[test]
fn test_missing_quote_reads_as_zero() {
    let config = adjust_80_liquidate_90();
    assert!(current_ltv(d(10), d(100), d(1), d(0)).unwrap().is_zero());
    assert!(
        max_withdrawable_collateral(d(10), d(100), d(1), d(0), config)
            .unwrap()
            .is_zero()
    );
}
