//! Volatile ledger state: reserves, rates, positions, balances and quotes.
//!
//! None of this goes through the metadata caches; every call is a fresh read.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use vaultlens_common::error::AppError;
use vaultlens_common::types::{
    AccountAddress, AssetAddress, FixedPointRate, OracleQuote, PositionInfo, VaultAddress,
    VaultState,
};
use vaultlens_engine::units;

use crate::client::AptosClient;
use crate::fungible_asset::query_forms;
use crate::{Protocol, move_json};

/// Source name reported with oracle quotes.
pub const ORACLE_SOURCE: &str = "Pyth";

const BALANCE_QUERY: &str = r#"
query FungibleAssetBalance($owner: String!, $asset_types: [String!]) {
  current_fungible_asset_balances(
    where: { owner_address: { _eq: $owner }, asset_type: { _in: $asset_types } }
  ) {
    amount
  }
}
"#;

/// Reads of ledger state that changes between requests.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Every vault in the protocol registry.
    async fn all_vaults(&self) -> Result<Vec<VaultAddress>, AppError>;

    async fn vault_state(&self, vault: VaultAddress) -> Result<VaultState, AppError>;

    /// Current per-second borrow rate of an interest rate model.
    async fn interest_rate(
        &self,
        irm: AccountAddress,
        cash: u128,
        total_borrows: u128,
    ) -> Result<FixedPointRate, AppError>;

    async fn position_info(&self, position: AccountAddress) -> Result<PositionInfo, AppError>;

    async fn user_positions(&self, owner: AccountAddress) -> Result<Vec<AccountAddress>, AppError>;

    /// Raw wallet balance of `asset` held by `owner`; 0 when there is none.
    async fn fungible_balance(
        &self,
        owner: AccountAddress,
        asset: AssetAddress,
    ) -> Result<u128, AppError>;

    /// Oracle price of `asset` in the unit asset, or `None` when the oracle
    /// has no quote.
    async fn oracle_quote(
        &self,
        oracle: AccountAddress,
        asset: AssetAddress,
        unit_decimals: u8,
        asset_decimals: u8,
    ) -> Result<Option<OracleQuote>, AppError>;
}

pub struct AptosLedger {
    client: Arc<AptosClient>,
    protocol: Protocol,
}

impl AptosLedger {
    pub fn new(client: Arc<AptosClient>, protocol: Protocol) -> Self {
        Self { client, protocol }
    }

    async fn view_one(
        &self,
        module: &str,
        function: &str,
        arguments: Vec<Value>,
    ) -> Result<Value, AppError> {
        let function = self.protocol.member(module, function);
        let values = self.client.view(&function, &[], arguments).await?;
        Ok(move_json::first(values, &function)?)
    }
}

#[async_trait]
impl LedgerSource for AptosLedger {
    async fn all_vaults(&self) -> Result<Vec<VaultAddress>, AppError> {
        let value = self.view_one("vault_registry", "all_vaults", vec![]).await?;
        let vaults = move_json::address_list(&value, "all_vaults")?;
        tracing::debug!(count = vaults.len(), "Loaded vault registry");
        Ok(vaults.into_iter().map(VaultAddress::from).collect())
    }

    async fn vault_state(&self, vault: VaultAddress) -> Result<VaultState, AppError> {
        let value = self
            .view_one("vault", "latest_state", vec![json!(vault.to_string())])
            .await?;
        Ok(decode_vault_state(&value)?)
    }

    async fn interest_rate(
        &self,
        irm: AccountAddress,
        cash: u128,
        total_borrows: u128,
    ) -> Result<FixedPointRate, AppError> {
        // The model takes borrows before cash.
        let value = self
            .view_one(
                "irm",
                "compute_interest_rate",
                vec![
                    json!(irm.to_string()),
                    json!(total_borrows.to_string()),
                    json!(cash.to_string()),
                ],
            )
            .await?;
        Ok(FixedPointRate(move_json::as_u128(&value, "interest_rate")?))
    }

    async fn position_info(&self, position: AccountAddress) -> Result<PositionInfo, AppError> {
        let value = self
            .view_one(
                "position_manager",
                "position_info",
                vec![json!(position.to_string())],
            )
            .await?;
        Ok(decode_position_info(position, &value)?)
    }

    async fn user_positions(&self, owner: AccountAddress) -> Result<Vec<AccountAddress>, AppError> {
        let value = self
            .view_one(
                "user_position_recorder",
                "get_user_positions",
                vec![json!(owner.to_string())],
            )
            .await?;
        Ok(move_json::address_list(&value, "user_positions")?)
    }

    async fn fungible_balance(
        &self,
        owner: AccountAddress,
        asset: AssetAddress,
    ) -> Result<u128, AppError> {
        let data = self
            .client
            .graphql(
                BALANCE_QUERY,
                json!({
                    "owner": owner.to_string(),
                    "asset_types": query_forms(&[asset]),
                }),
            )
            .await?;
        Ok(decode_balance(&data)?)
    }

    async fn oracle_quote(
        &self,
        oracle: AccountAddress,
        asset: AssetAddress,
        unit_decimals: u8,
        asset_decimals: u8,
    ) -> Result<Option<OracleQuote>, AppError> {
        let base_amount = units::unit(asset_decimals)?;
        let value = self
            .view_one(
                "oracle",
                "get_quote_view",
                vec![
                    json!(oracle.to_string()),
                    json!(asset.to_string()),
                    json!(unit_decimals),
                    json!(base_amount.to_string()),
                ],
            )
            .await?;

        let quote = decode_quote(&value, unit_decimals)?;
        if quote.is_none() {
            tracing::debug!(asset = %asset, "Oracle has no quote");
        }
        Ok(quote)
    }
}

pub fn decode_vault_state(value: &Value) -> Result<VaultState, AppError> {
    Ok(VaultState {
        cash: move_json::u128_field(value, "cash")?,
        total_borrows: move_json::u128_field(value, "total_borrows")?,
        total_shares: move_json::u128_field(value, "total_shares")?,
        fee_shares: move_json::u128_field(value, "fee_shares")?,
        total_debt_shares: move_json::u128_field(value, "total_debt_shares")?,
    })
}

pub fn decode_position_info(
    position: AccountAddress,
    value: &Value,
) -> Result<PositionInfo, AppError> {
    Ok(PositionInfo {
        position,
        owner: move_json::address_field(value, "owner")?,
        borrowed_vault: move_json::address_field(value, "borrowed_vault")?.into(),
        borrowed_asset: move_json::address_field(value, "borrowed_asset")?.into(),
        collateral_asset: move_json::address_field(value, "collateral_asset")?.into(),
        collateral_amount: move_json::u128_field(value, "collateral_amount")?,
        debt_shares: move_json::u128_field(value, "debt_shares")?,
    })
}

pub fn decode_balance(data: &Value) -> Result<u128, AppError> {
    let rows = move_json::as_array(
        move_json::field(data, "current_fungible_asset_balances")?,
        "current_fungible_asset_balances",
    )?;
    let mut total: u128 = 0;
    for row in rows {
        let amount = move_json::u128_field(row, "amount")?;
        total = total
            .checked_add(amount)
            .ok_or_else(|| AppError::overflow("wallet balance exceeds u128"))?;
    }
    Ok(total)
}

pub fn decode_quote(
    value: &Value,
    unit_decimals: u8,
) -> Result<Option<OracleQuote>, AppError> {
    let Some(raw) = move_json::option_inner(value, "quote")? else {
        return Ok(None);
    };
    let raw = move_json::as_u128(raw, "quote")?;
    Ok(Some(OracleQuote {
        price: units::quote_price(raw, unit_decimals)?,
        source: ORACLE_SOURCE.to_string(),
    }))
}
