//! Conversions between on-chain integer amounts and human-readable decimals.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use vaultlens_common::error::AppError;

use crate::fixed_point;

/// Largest number of fractional digits a `Decimal` can carry.
pub const MAX_DECIMALS: u8 = 28;

fn check_decimals(decimals: u8) -> Result<(), AppError> {
    if decimals > MAX_DECIMALS {
        return Err(AppError::invalid_input(format!(
            "{decimals} decimals exceeds the supported maximum of {MAX_DECIMALS}"
        )));
    }
    Ok(())
}

/// `10^decimals` as a decimal.
pub fn unit(decimals: u8) -> Result<Decimal, AppError> {
    check_decimals(decimals)?;
    Ok(Decimal::from_i128_with_scale(10i128.pow(decimals as u32), 0))
}

/// `raw / 10^decimals`, exactly.
pub fn to_human_amount(raw: u128, decimals: u8) -> Result<Decimal, AppError> {
    check_decimals(decimals)?;
    let raw_signed = i128::try_from(raw)
        .map_err(|_| AppError::overflow(format!("amount {raw} exceeds decimal range")))?;
    Decimal::try_from_i128_with_scale(raw_signed, decimals as u32)
        .map_err(|_| AppError::overflow(format!("amount {raw} exceeds decimal range")))
}

/// `amount * 10^decimals`, truncated toward zero.
pub fn to_on_chain_amount(amount: Decimal, decimals: u8) -> Result<u128, AppError> {
    fixed_point::ensure_non_negative("amount", amount)?;
    let scaled = fixed_point::mul(amount, unit(decimals)?, "on-chain amount")?;
    scaled
        .trunc()
        .to_u128()
        .ok_or_else(|| AppError::overflow(format!("amount {amount} does not fit in u128")))
}

/// Oracle quotes are integers scaled by the position manager's unit decimals.
pub fn quote_price(raw: u128, unit_decimals: u8) -> Result<Decimal, AppError> {
    to_human_amount(raw, unit_decimals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_human_amount() {
        assert_eq!(
            to_human_amount(123_456_789, 8).unwrap(),
            Decimal::new(123_456_789, 8)
        );
        assert_eq!(to_human_amount(5, 0).unwrap(), Decimal::from(5));
    }

    #[test]
    fn test_to_on_chain_truncates() {
        let amount = Decimal::new(1_234_567, 6); // 1.234567
        assert_eq!(to_on_chain_amount(amount, 4).unwrap(), 12_345);
        assert_eq!(to_on_chain_amount(Decimal::ONE, 8).unwrap(), 100_000_000);
    }

    #[test]
    fn test_to_on_chain_rejects_negative() {
        let err = to_on_chain_amount(Decimal::NEGATIVE_ONE, 8).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_decimals_limit() {
        assert!(to_human_amount(1, 28).is_ok());
        assert!(matches!(
            to_human_amount(1, 29).unwrap_err(),
            AppError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_huge_raw_amount_overflows() {
        assert!(matches!(
            to_human_amount(u128::MAX, 8).unwrap_err(),
            AppError::Overflow(_)
        ));
    }

    #[test]
    fn test_quote_price() {
        assert_eq!(quote_price(2_500_000, 6).unwrap(), Decimal::new(25, 1));
    }
}
