//! Fixed-point and checked decimal helpers shared by the interest and risk math.
//!
//! `Decimal` operators panic on overflow and division by zero, so everything
//! here goes through the checked variants and reports an [`AppError`].

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use vaultlens_common::error::AppError;
use vaultlens_common::types::FixedPointRate;

/// Seconds in a 365-day year.
pub const SECONDS_PER_YEAR: u64 = 60 * 60 * 24 * 365;

/// `2^64`, the denominator of a [`FixedPointRate`].
pub fn rate_scale() -> Decimal {
    Decimal::from(u64::MAX) + Decimal::ONE
}

/// Per-second growth `raw / 2^64` of a fixed-point rate.
pub fn per_second_growth(rate: FixedPointRate) -> Result<Decimal, AppError> {
    let raw = decimal_from_u128(rate.raw(), "fixed-point rate")?;
    div(raw, rate_scale(), "fixed-point rate")
}

/// Lossless conversion of an on-chain integer into a decimal.
pub fn decimal_from_u128(value: u128, what: &str) -> Result<Decimal, AppError> {
    Decimal::from_u128(value)
        .ok_or_else(|| AppError::overflow(format!("{what} {value} exceeds decimal range")))
}

pub fn ensure_non_negative(name: &str, value: Decimal) -> Result<Decimal, AppError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AppError::invalid_input(format!(
            "{name} must be non-negative, got {value}"
        )));
    }
    Ok(value)
}

pub fn add(a: Decimal, b: Decimal, what: &str) -> Result<Decimal, AppError> {
    a.checked_add(b)
        .ok_or_else(|| AppError::overflow(format!("{what}: {a} + {b}")))
}

pub fn sub(a: Decimal, b: Decimal, what: &str) -> Result<Decimal, AppError> {
    a.checked_sub(b)
        .ok_or_else(|| AppError::overflow(format!("{what}: {a} - {b}")))
}

pub fn mul(a: Decimal, b: Decimal, what: &str) -> Result<Decimal, AppError> {
    a.checked_mul(b)
        .ok_or_else(|| AppError::overflow(format!("{what}: {a} * {b}")))
}

pub fn div(a: Decimal, b: Decimal, what: &str) -> Result<Decimal, AppError> {
    if b.is_zero() {
        return Err(AppError::invalid_input(format!("{what}: division by zero")));
    }
    a.checked_div(b)
        .ok_or_else(|| AppError::overflow(format!("{what}: {a} / {b}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_scale_is_two_pow_64() {
        assert_eq!(rate_scale().to_string(), "18446744073709551616");
    }

    #[test]
    fn test_growth_of_half() {
        let half = FixedPointRate(1u128 << 63);
        assert_eq!(per_second_growth(half).unwrap(), Decimal::new(5, 1));
    }

    #[test]
    fn test_growth_of_zero() {
        assert!(per_second_growth(FixedPointRate::ZERO).unwrap().is_zero());
    }

    #[test]
    fn test_rate_beyond_decimal_range() {
        let err = per_second_growth(FixedPointRate(u128::MAX)).unwrap_err();
        assert!(matches!(err, AppError::Overflow(_)));
    }

    #[test]
    fn test_negative_rejected_zero_accepted() {
        assert!(ensure_non_negative("amount", Decimal::NEGATIVE_ONE).is_err());
        assert!(ensure_non_negative("amount", Decimal::ZERO).is_ok());
        assert!(ensure_non_negative("amount", -Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_div_by_zero_is_invalid_input() {
        let err = div(Decimal::ONE, Decimal::ZERO, "ratio").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_mul_overflow() {
        let err = mul(Decimal::MAX, Decimal::TWO, "value").unwrap_err();
        assert!(matches!(err, AppError::Overflow(_)));
    }
}
