use std::fmt;
use std::str::FromStr;

use alloy::primitives::B256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Parts-per-100,000 denominator used by LTV configurations.
pub const LTV_SCALE: u32 = 100_000;

/// A 32-byte ledger account address.
///
/// Parses `0x`-prefixed hex of up to 64 digits (short forms such as `0x1`
/// are left-padded) and always renders in the canonical long form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountAddress(B256);

impl AccountAddress {
    pub const fn new(bytes: B256) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &B256 {
        &self.0
    }

    /// Shorthand used by log lines, e.g. `0x4858…7ca3`.
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}…{}", &full[..6], &full[full.len() - 4..])
    }
}

impl FromStr for AccountAddress {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| AppError::invalid_input(format!("address must start with 0x: {s}")))?;

        if digits.is_empty() || digits.len() > 64 {
            return Err(AppError::invalid_input(format!(
                "address must have 1 to 64 hex digits: {s}"
            )));
        }

        let padded = format!("{digits:0>64}");
        let bytes = alloy::hex::decode(&padded)
            .map_err(|e| AppError::invalid_input(format!("invalid address {s}: {e}")))?;

        Ok(Self(B256::from_slice(&bytes)))
    }
}

impl TryFrom<String> for AccountAddress {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountAddress> for String {
    fn from(value: AccountAddress) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", alloy::hex::encode(self.0))
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountAddress({self})")
    }
}

/// The kind of metadata a resolver produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverKind {
    FungibleAsset,
    Vault,
    PositionManager,
}

impl fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverKind::FungibleAsset => write!(f, "fungible_asset"),
            ResolverKind::Vault => write!(f, "vault"),
            ResolverKind::PositionManager => write!(f, "position_manager"),
        }
    }
}

macro_rules! address_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub AccountAddress);

        impl $name {
            pub fn address(&self) -> AccountAddress {
                self.0
            }
        }

        impl From<AccountAddress> for $name {
            fn from(value: AccountAddress) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

address_key!(
    /// Key of a fungible asset metadata object.
    AssetAddress
);
address_key!(
    /// Key of a lending vault.
    VaultAddress
);
address_key!(
    /// Key of a position manager (borrow manager) object.
    PositionManagerAddress
);

/// Fungible asset metadata as reported by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub asset_type: AssetAddress,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub icon_uri: Option<String>,
    pub project_uri: Option<String>,
}

/// Static configuration addresses of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMetadata {
    pub vault: VaultAddress,
    pub governance: AccountAddress,
    pub vault_asset: AssetAddress,
    pub debt_asset: AssetAddress,
    pub underlying_asset: AssetAddress,
    pub underlying_asset_store: AccountAddress,
    pub interest_fee_store: AccountAddress,
    pub config_address: AccountAddress,
    pub irm_address: AccountAddress,
    pub borrow_manager: Option<PositionManagerAddress>,
}

/// LTV bounds for one collateral, in parts-per-100,000.
///
/// `ltv` bounds opening and adjusting a position; `lltv` is the
/// liquidation threshold. Always `ltv < lltv <= 100_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLtvConfig")]
pub struct LtvConfig {
    ltv: u32,
    lltv: u32,
}

#[derive(Deserialize)]
struct RawLtvConfig {
    ltv: u32,
    lltv: u32,
}

impl TryFrom<RawLtvConfig> for LtvConfig {
    type Error = AppError;

    fn try_from(raw: RawLtvConfig) -> Result<Self, Self::Error> {
        LtvConfig::new(raw.ltv, raw.lltv)
    }
}

impl LtvConfig {
    pub fn new(ltv: u32, lltv: u32) -> Result<Self, AppError> {
        if ltv >= lltv || lltv > LTV_SCALE {
            return Err(AppError::invalid_input(format!(
                "LTV config must satisfy ltv < lltv <= {LTV_SCALE}, got ltv={ltv} lltv={lltv}"
            )));
        }
        Ok(Self { ltv, lltv })
    }

    pub fn ltv(&self) -> u32 {
        self.ltv
    }

    pub fn lltv(&self) -> u32 {
        self.lltv
    }

    /// Adjust bound as a percentage (80_000 → 80%).
    pub fn max_ltv(&self) -> Percentage {
        Percentage::from_ltv_units(self.ltv)
    }

    /// Liquidation bound as a percentage.
    pub fn liquidation_ltv(&self) -> Percentage {
        Percentage::from_ltv_units(self.lltv)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralLtv {
    pub collateral_asset: AssetAddress,
    pub ltv_config: LtvConfig,
}

/// Position manager configuration: oracle, managed vault and per-collateral LTVs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionManagerMetadata {
    pub address: PositionManagerAddress,
    pub oracle: AccountAddress,
    pub managed_vault: VaultAddress,
    pub unit_decimals: u8,
    pub collaterals: Vec<CollateralLtv>,
}

impl PositionManagerMetadata {
    pub fn ltv_for(&self, asset: &AssetAddress) -> Option<LtvConfig> {
        self.collaterals
            .iter()
            .find(|c| &c.collateral_asset == asset)
            .map(|c| c.ltv_config)
    }
}

/// Per-second interest rate as a 64.64 fixed-point fraction:
/// the per-second multiplier is `1 + raw / 2^64`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixedPointRate(pub u128);

impl FixedPointRate {
    pub const ZERO: FixedPointRate = FixedPointRate(0);

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

/// A percentage value (`75` means 75%).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(pub Decimal);

impl Percentage {
    pub const ZERO: Percentage = Percentage(Decimal::ZERO);
    pub const HUNDRED: Percentage = Percentage(Decimal::ONE_HUNDRED);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_f64(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        self.0.to_f64().unwrap_or_default()
    }

    /// Converts parts-per-100,000 into a percentage.
    pub fn from_ltv_units(units: u32) -> Self {
        Self(Decimal::new(units as i64, 3))
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self
            .0
            .round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
        write!(f, "{rounded:.2}%")
    }
}

/// Raw pool reserves of a vault, in on-chain units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultState {
    pub cash: u128,
    pub total_borrows: u128,
    pub total_shares: u128,
    pub fee_shares: u128,
    pub total_debt_shares: u128,
}

/// On-chain view of a single borrow position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub position: AccountAddress,
    pub owner: AccountAddress,
    pub borrowed_vault: VaultAddress,
    pub borrowed_asset: AssetAddress,
    pub collateral_asset: AssetAddress,
    pub collateral_amount: u128,
    pub debt_shares: u128,
}

/// A price quote from the protocol oracle, denominated in the unit asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleQuote {
    pub price: Decimal,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_short_form_is_padded() {
        let addr: AccountAddress = "0x1".parse().unwrap();
        assert_eq!(
            addr.to_string(),
            "0x0000000000000000000000000000000000000000000000000000000000000001"
        );
        let long: AccountAddress =
            "0x0000000000000000000000000000000000000000000000000000000000000001"
                .parse()
                .unwrap();
        assert_eq!(addr, long);
    }

    #[test]
    fn test_address_rejects_garbage() {
        assert!("1234".parse::<AccountAddress>().is_err());
        assert!("0x".parse::<AccountAddress>().is_err());
        assert!("0xzz".parse::<AccountAddress>().is_err());
        assert!(format!("0x{}", "1".repeat(65)).parse::<AccountAddress>().is_err());
    }

    #[test]
    fn test_address_is_case_insensitive() {
        let upper: AccountAddress = "0xABCDEF".parse().unwrap();
        let lower: AccountAddress = "0xabcdef".parse().unwrap();
        assert_eq!(upper, lower);
        assert!(upper.to_string().ends_with("abcdef"));
    }

    #[test]
    fn test_address_serde_roundtrip_uses_canonical_string() {
        let addr: VaultAddress = "0xa".parse().unwrap();
        let json = serde_json::to_value(addr).unwrap();
        assert_eq!(json, serde_json::json!(format!("0x{:0>64}", "a")));
        let back: VaultAddress = serde_json::from_value(json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_ltv_config_bounds() {
        assert!(LtvConfig::new(80_000, 90_000).is_ok());
        assert!(LtvConfig::new(0, 1).is_ok());
        assert!(LtvConfig::new(90_000, 90_000).is_err());
        assert!(LtvConfig::new(95_000, 90_000).is_err());
        assert!(LtvConfig::new(80_000, 100_001).is_err());
    }

    #[test]
    fn test_ltv_config_percentages() {
        let config = LtvConfig::new(80_000, 90_000).unwrap();
        assert_eq!(config.max_ltv().value(), Decimal::from(80));
        assert_eq!(config.liquidation_ltv().value(), Decimal::from(90));
    }

    #[test]
    fn test_ltv_config_deserialize_validates() {
        let ok: LtvConfig = serde_json::from_str(r#"{"ltv":75000,"lltv":85000}"#).unwrap();
        assert_eq!(ok.ltv(), 75_000);
        assert!(serde_json::from_str::<LtvConfig>(r#"{"ltv":85000,"lltv":75000}"#).is_err());
    }

    #[test]
    fn test_percentage_display() {
        assert_eq!(Percentage::new(Decimal::new(12345, 3)).to_string(), "12.35%");
        assert_eq!(Percentage::ZERO.to_string(), "0.00%");
    }
}
