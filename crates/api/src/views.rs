//! Vault and position views served by the API.
//!
//! Each request takes one [`MetadataScope`](crate::state::MetadataScope),
//! resolves all the static metadata it needs through the scope's caches
//! (batched), then reads volatile state from the ledger and hands both to
//! the engine.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vaultlens_common::error::AppError;
use vaultlens_common::types::{
    AccountAddress, AssetAddress, AssetMetadata, FixedPointRate, LtvConfig, OracleQuote,
    Percentage, PositionInfo, PositionManagerMetadata, VaultAddress, VaultMetadata, VaultState,
};
use vaultlens_engine::fixed_point::ensure_non_negative;
use vaultlens_engine::risk::{self, CollateralAction, PositionSnapshot, RiskBand};
use vaultlens_engine::units::to_human_amount;
use vaultlens_engine::VaultRates;

use crate::state::AppState;

// ============================================================
// Vaults
// ============================================================

#[derive(Debug, Clone, Serialize)]
pub struct VaultSummary {
    pub vault: VaultAddress,
    pub underlying_asset: AssetMetadata,
    pub available_liquidity: Decimal,
    pub total_borrowed: Decimal,
    #[serde(flatten)]
    pub rates: VaultRates,
}

#[derive(Debug, Clone, Serialize)]
pub struct VaultDetail {
    pub metadata: VaultMetadata,
    pub vault_asset: AssetMetadata,
    pub debt_asset: AssetMetadata,
    pub underlying_asset: AssetMetadata,
    pub state: VaultState,
    pub interest_rate: FixedPointRate,
    #[serde(flatten)]
    pub rates: VaultRates,
    pub position_manager: Option<PositionManagerMetadata>,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollateralView {
    pub asset: AssetMetadata,
    pub max_ltv: Percentage,
    pub liquidation_ltv: Percentage,
    /// `None` when the oracle has no quote for the asset.
    pub price: Option<Decimal>,
    pub price_source: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeverageParams {
    pub collateral: AssetAddress,
    pub collateral_amount: Decimal,
    pub leverage: Decimal,
}

/// Borrow size and LTV of a leveraged position opened against a vault, with
/// the borrowed value re-deposited as collateral.
#[derive(Debug, Clone, Serialize)]
pub struct LeveragePreview {
    pub vault: VaultAddress,
    pub borrowed_asset: AssetMetadata,
    pub collateral_asset: AssetMetadata,
    pub collateral_amount: Decimal,
    pub leverage: Decimal,
    pub borrow_amount: Decimal,
    pub ltv: Percentage,
    pub max_ltv: Percentage,
    pub liquidation_ltv: Percentage,
    pub risk_band: RiskBand,
}

/// Reserves and rates of a vault as of now.
struct LiveVault {
    state: VaultState,
    interest_rate: FixedPointRate,
    rates: VaultRates,
}

async fn live_vault(state: &AppState, meta: &VaultMetadata) -> Result<LiveVault, AppError> {
    let vault_state = state.ledger.vault_state(meta.vault).await?;
    let interest_rate = state
        .ledger
        .interest_rate(meta.irm_address, vault_state.cash, vault_state.total_borrows)
        .await?;
    let rates = VaultRates::compute(interest_rate, vault_state.cash, vault_state.total_borrows)?;
    Ok(LiveVault {
        state: vault_state,
        interest_rate,
        rates,
    })
}

pub struct VaultService;

impl VaultService {
    /// Every registered vault with its current rates.
    pub async fn list(state: &AppState) -> Result<Vec<VaultSummary>, AppError> {
        let scope = state.metadata();
        let vaults = state.ledger.all_vaults().await?;
        let metas = scope.vaults.get_many(&vaults).await?;

        let underlying: Vec<AssetAddress> = metas.iter().map(|m| m.underlying_asset).collect();
        let (assets, live) = futures::try_join!(
            async { Ok::<_, AppError>(scope.assets.get_many(&underlying).await?) },
            try_join_all(metas.iter().map(|meta| live_vault(state, meta))),
        )?;

        tracing::debug!(vaults = metas.len(), "Listed vaults");

        metas
            .into_iter()
            .zip(assets)
            .zip(live)
            .map(|((meta, asset), live)| {
                Ok(VaultSummary {
                    vault: meta.vault,
                    available_liquidity: to_human_amount(live.state.cash, asset.decimals)?,
                    total_borrowed: to_human_amount(live.state.total_borrows, asset.decimals)?,
                    underlying_asset: asset,
                    rates: live.rates,
                })
            })
            .collect()
    }

    pub async fn detail(state: &AppState, vault: VaultAddress) -> Result<VaultDetail, AppError> {
        let scope = state.metadata();
        let meta = scope.vaults.get_one(vault).await?;

        let position_manager = async {
            match meta.borrow_manager {
                Some(manager) => Ok::<_, AppError>(Some(
                    scope.position_managers.get_one(manager).await?,
                )),
                None => Ok(None),
            }
        };
        let assets = async {
            Ok::<_, AppError>(
                scope
                    .assets
                    .get_many(&[meta.vault_asset, meta.debt_asset, meta.underlying_asset])
                    .await?,
            )
        };
        let (assets, position_manager, live) =
            futures::try_join!(assets, position_manager, live_vault(state, &meta))?;

        let [vault_asset, debt_asset, underlying_asset] = <[AssetMetadata; 3]>::try_from(assets)
            .map_err(|v| AppError::Internal(format!("expected 3 asset records, got {}", v.len())))?;

        Ok(VaultDetail {
            metadata: meta,
            vault_asset,
            debt_asset,
            underlying_asset,
            state: live.state,
            interest_rate: live.interest_rate,
            rates: live.rates,
            position_manager,
            as_of: Utc::now(),
        })
    }

    /// Collaterals accepted when borrowing from `vault`; empty when the vault
    /// has no position manager.
    pub async fn collaterals(
        state: &AppState,
        vault: VaultAddress,
    ) -> Result<Vec<CollateralView>, AppError> {
        let scope = state.metadata();
        let meta = scope.vaults.get_one(vault).await?;
        let Some(manager) = meta.borrow_manager else {
            return Ok(Vec::new());
        };
        let pm = scope.position_managers.get_one(manager).await?;

        let keys: Vec<AssetAddress> = pm.collaterals.iter().map(|c| c.collateral_asset).collect();
        let assets = scope.assets.get_many(&keys).await?;
        let quotes = try_join_all(assets.iter().zip(&keys).map(|(asset, key)| {
            state
                .ledger
                .oracle_quote(pm.oracle, *key, pm.unit_decimals, asset.decimals)
        }))
        .await?;

        Ok(pm
            .collaterals
            .iter()
            .zip(assets)
            .zip(quotes)
            .map(|((collateral, asset), quote)| CollateralView {
                asset,
                max_ltv: collateral.ltv_config.max_ltv(),
                liquidation_ltv: collateral.ltv_config.liquidation_ltv(),
                price: quote.as_ref().map(|q| q.price),
                price_source: quote.map(|q| q.source),
            })
            .collect())
    }

    pub async fn leverage_preview(
        state: &AppState,
        vault: VaultAddress,
        params: LeverageParams,
    ) -> Result<LeveragePreview, AppError> {
        let collateral_amount = ensure_non_negative("collateral_amount", params.collateral_amount)?;
        let leverage = ensure_non_negative("leverage", params.leverage)?;

        let scope = state.metadata();
        let meta = scope.vaults.get_one(vault).await?;
        let manager = meta.borrow_manager.ok_or_else(|| {
            AppError::NotFound(format!("Vault {} has no position manager", meta.vault))
        })?;

        let asset_keys = [meta.underlying_asset, params.collateral];
        let (pm, assets) = futures::try_join!(
            scope.position_managers.get_one(manager),
            scope.assets.get_many(&asset_keys),
        )?;
        let ltv_config = pm.ltv_for(&params.collateral).ok_or_else(|| {
            AppError::NotFound(format!(
                "Collateral {} is not supported by position manager {}",
                params.collateral, manager
            ))
        })?;
        let [borrowed_asset, collateral_asset] = <[AssetMetadata; 2]>::try_from(assets)
            .map_err(|v| AppError::Internal(format!("expected 2 asset records, got {}", v.len())))?;

        let (borrowed_quote, collateral_quote) = futures::try_join!(
            state.ledger.oracle_quote(
                pm.oracle,
                meta.underlying_asset,
                pm.unit_decimals,
                borrowed_asset.decimals
            ),
            state.ledger.oracle_quote(
                pm.oracle,
                params.collateral,
                pm.unit_decimals,
                collateral_asset.decimals
            ),
        )?;
        let borrow_price = price_or_zero(borrowed_quote, &borrowed_asset);
        let collateral_price = price_or_zero(collateral_quote, &collateral_asset);

        let borrow_amount = risk::leverage_borrow_amount(
            collateral_amount,
            leverage,
            borrow_price,
            collateral_price,
        )?;
        let ltv = risk::leverage_ltv(
            borrow_amount,
            collateral_amount,
            borrow_price,
            collateral_price,
        )?;

        Ok(LeveragePreview {
            vault: meta.vault,
            borrowed_asset,
            collateral_asset,
            collateral_amount,
            leverage,
            borrow_amount,
            ltv,
            max_ltv: ltv_config.max_ltv(),
            liquidation_ltv: ltv_config.liquidation_ltv(),
            risk_band: risk::classify(ltv, ltv_config),
        })
    }
}

// ============================================================
// Positions
// ============================================================

#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    pub position: AccountAddress,
    pub owner: AccountAddress,
    pub borrowed_vault: VaultAddress,
    pub borrowed_asset: AssetMetadata,
    pub collateral_asset: AssetMetadata,
    #[serde(flatten)]
    pub snapshot: PositionSnapshot,
    pub ltv: Percentage,
    pub max_ltv: Percentage,
    pub liquidation_ltv: Percentage,
    pub risk_band: RiskBand,
    pub max_withdrawable: Decimal,
    pub borrow_apy: Percentage,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustmentParams {
    pub action: CollateralAction,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentPreview {
    pub position: AccountAddress,
    pub action: CollateralAction,
    pub requested_amount: Decimal,
    /// Largest amount the action allows: wallet balance or max withdrawable.
    pub max_amount: Decimal,
    /// Amount the projection was computed for.
    pub amount: Decimal,
    pub clamped: bool,
    pub current_ltv: Percentage,
    pub projected_ltv: Percentage,
    pub projected_risk_band: RiskBand,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepayParams {
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepayPreview {
    pub position: AccountAddress,
    pub requested_amount: Decimal,
    pub amount: Decimal,
    pub clamped: bool,
    pub remaining_debt: Decimal,
    pub current_ltv: Percentage,
    pub projected_ltv: Percentage,
    pub projected_risk_band: RiskBand,
}

/// Everything known about a position at one instant.
struct PositionContext {
    info: PositionInfo,
    borrowed_asset: AssetMetadata,
    collateral_asset: AssetMetadata,
    ltv_config: LtvConfig,
    snapshot: PositionSnapshot,
    rates: VaultRates,
}

fn price_or_zero(quote: Option<OracleQuote>, asset: &AssetMetadata) -> Decimal {
    match quote {
        Some(quote) => quote.price,
        None => {
            tracing::warn!(asset = %asset.symbol, "No oracle quote, pricing at zero");
            Decimal::ZERO
        }
    }
}

async fn load_position(
    state: &AppState,
    position: AccountAddress,
) -> Result<PositionContext, AppError> {
    let scope = state.metadata();
    let info = state.ledger.position_info(position).await?;
    let vault = scope.vaults.get_one(info.borrowed_vault).await?;
    let manager = vault.borrow_manager.ok_or_else(|| {
        AppError::NotFound(format!("Vault {} has no position manager", vault.vault))
    })?;

    let asset_keys = [info.borrowed_asset, info.collateral_asset];
    let (pm, assets) = futures::try_join!(
        scope.position_managers.get_one(manager),
        scope.assets.get_many(&asset_keys),
    )?;
    let ltv_config = pm.ltv_for(&info.collateral_asset).ok_or_else(|| {
        AppError::NotFound(format!(
            "Collateral {} is not supported by position manager {}",
            info.collateral_asset, manager
        ))
    })?;
    let [borrowed_asset, collateral_asset] = <[AssetMetadata; 2]>::try_from(assets)
        .map_err(|v| AppError::Internal(format!("expected 2 asset records, got {}", v.len())))?;

    let (borrowed_quote, collateral_quote, live) = futures::try_join!(
        state.ledger.oracle_quote(
            pm.oracle,
            info.borrowed_asset,
            pm.unit_decimals,
            borrowed_asset.decimals
        ),
        state.ledger.oracle_quote(
            pm.oracle,
            info.collateral_asset,
            pm.unit_decimals,
            collateral_asset.decimals
        ),
        live_vault(state, &vault),
    )?;

    // Debt shares are reported in borrowed-asset units.
    let snapshot = PositionSnapshot::new(
        to_human_amount(info.debt_shares, borrowed_asset.decimals)?,
        to_human_amount(info.collateral_amount, collateral_asset.decimals)?,
        price_or_zero(borrowed_quote, &borrowed_asset),
        price_or_zero(collateral_quote, &collateral_asset),
    )?;

    Ok(PositionContext {
        info,
        borrowed_asset,
        collateral_asset,
        ltv_config,
        snapshot,
        rates: live.rates,
    })
}

pub struct PositionService;

impl PositionService {
    pub async fn view(state: &AppState, position: AccountAddress) -> Result<PositionView, AppError> {
        let ctx = load_position(state, position).await?;
        let ltv = ctx.snapshot.ltv()?;
        let max_withdrawable = state.risk.max_withdrawable(&ctx.snapshot, ctx.ltv_config)?;

        tracing::debug!(
            position = %position.short(),
            ltv = %ltv,
            "Computed position risk"
        );

        Ok(PositionView {
            position,
            owner: ctx.info.owner,
            borrowed_vault: ctx.info.borrowed_vault,
            borrowed_asset: ctx.borrowed_asset,
            collateral_asset: ctx.collateral_asset,
            snapshot: ctx.snapshot,
            ltv,
            max_ltv: ctx.ltv_config.max_ltv(),
            liquidation_ltv: ctx.ltv_config.liquidation_ltv(),
            risk_band: risk::classify(ltv, ctx.ltv_config),
            max_withdrawable,
            borrow_apy: ctx.rates.borrow_apy,
            as_of: Utc::now(),
        })
    }

    /// Projected LTV after adding or removing collateral. The amount is
    /// capped at the wallet balance (add) or the max withdrawable (remove).
    pub async fn preview_adjustment(
        state: &AppState,
        position: AccountAddress,
        params: AdjustmentParams,
    ) -> Result<AdjustmentPreview, AppError> {
        let requested = ensure_non_negative("amount", params.amount)?;
        let ctx = load_position(state, position).await?;

        let wallet_balance = match params.action {
            CollateralAction::Add => {
                let raw = state
                    .ledger
                    .fungible_balance(ctx.info.owner, ctx.info.collateral_asset)
                    .await?;
                to_human_amount(raw, ctx.collateral_asset.decimals)?
            }
            CollateralAction::Remove => Decimal::ZERO,
        };
        let max_amount = state.risk.max_collateral_adjustment(
            &ctx.snapshot,
            params.action,
            wallet_balance,
            ctx.ltv_config,
        )?;
        let amount = requested.min(max_amount);
        let projected = risk::projected_ltv_after_adjustment(&ctx.snapshot, amount, params.action)?;

        Ok(AdjustmentPreview {
            position,
            action: params.action,
            requested_amount: requested,
            max_amount,
            amount,
            clamped: amount < requested,
            current_ltv: ctx.snapshot.ltv()?,
            projected_ltv: projected,
            projected_risk_band: risk::classify(projected, ctx.ltv_config),
        })
    }

    /// Projected LTV after repaying debt, with the amount capped at the
    /// outstanding debt.
    pub async fn preview_repay(
        state: &AppState,
        position: AccountAddress,
        params: RepayParams,
    ) -> Result<RepayPreview, AppError> {
        let ctx = load_position(state, position).await?;
        let outstanding = ctx.snapshot.borrowed_amount;
        let amount = risk::clamp_repay(params.amount, outstanding)?;
        let remaining_debt = outstanding - amount;

        let projected = risk::current_ltv(
            remaining_debt,
            ctx.snapshot.collateral_amount,
            ctx.snapshot.borrowed_price,
            ctx.snapshot.collateral_price,
        )?;

        Ok(RepayPreview {
            position,
            requested_amount: params.amount,
            amount,
            clamped: amount < params.amount,
            remaining_debt,
            current_ltv: ctx.snapshot.ltv()?,
            projected_ltv: projected,
            projected_risk_band: risk::classify(projected, ctx.ltv_config),
        })
    }
}

// ============================================================
// Accounts
// ============================================================

#[derive(Debug, Clone, Serialize)]
pub struct AccountPositions {
    pub owner: AccountAddress,
    pub positions: Vec<AccountAddress>,
}

pub struct AccountService;

impl AccountService {
    pub async fn positions(
        state: &AppState,
        owner: AccountAddress,
    ) -> Result<AccountPositions, AppError> {
        let positions = state.ledger.user_positions(owner).await?;
        Ok(AccountPositions { owner, positions })
    }
}
