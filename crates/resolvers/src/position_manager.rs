//! Position manager metadata: oracle, managed vault and per-collateral LTVs.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::{Value, json};

use vaultlens_cache::Resolver;
use vaultlens_common::error::ResolutionError;
use vaultlens_common::types::{
    AccountAddress, CollateralLtv, LtvConfig, PositionManagerAddress, PositionManagerMetadata,
    ResolverKind,
};

use crate::client::AptosClient;
use crate::{Protocol, move_json};

pub struct PositionManagerResolver {
    client: Arc<AptosClient>,
    protocol: Protocol,
}

impl PositionManagerResolver {
    pub fn new(client: Arc<AptosClient>, protocol: Protocol) -> Self {
        Self { client, protocol }
    }

    async fn fetch(
        &self,
        manager: PositionManagerAddress,
    ) -> Result<PositionManagerMetadata, ResolutionError> {
        let address = manager.address();
        let collaterals_fn = self
            .protocol
            .member("position_manager", "supported_collaterals");
        let resource_type = self
            .protocol
            .member("position_manager", "PositionManagerMetadata");
        let (resource, collaterals) = futures::try_join!(
            self.client.resource(address, &resource_type),
            self.client
                .view(&collaterals_fn, &[], vec![json!(address.to_string())]),
        )?;
        let collaterals =
            move_json::address_list(&move_json::first(collaterals, &collaterals_fn)?, "supported_collaterals")?;

        let ltv_fn = self.protocol.member("position_manager", "ltv_config");
        let ltv_configs = try_join_all(collaterals.iter().map(|collateral| {
            let ltv_fn = &ltv_fn;
            async move {
                let values = self
                    .client
                    .view(
                        ltv_fn,
                        &[],
                        vec![json!(address.to_string()), json!(collateral.to_string())],
                    )
                    .await?;
                move_json::first(values, ltv_fn)
            }
        }))
        .await?;

        decode_position_manager(manager, &resource, &collaterals, &ltv_configs)
    }
}

#[async_trait]
impl Resolver<PositionManagerAddress, PositionManagerMetadata> for PositionManagerResolver {
    fn kind(&self) -> ResolverKind {
        ResolverKind::PositionManager
    }

    async fn resolve(
        &self,
        keys: &[PositionManagerAddress],
    ) -> Result<Vec<PositionManagerMetadata>, ResolutionError> {
        try_join_all(keys.iter().map(|manager| self.fetch(*manager))).await
    }
}

pub fn decode_ltv_config(value: &Value) -> Result<LtvConfig, ResolutionError> {
    let ltv = move_json::as_u32(move_json::field(value, "ltv")?, "ltv")?;
    let lltv = move_json::as_u32(move_json::field(value, "lltv")?, "lltv")?;
    LtvConfig::new(ltv, lltv).map_err(|e| ResolutionError::Decode(e.to_string()))
}

pub fn decode_position_manager(
    manager: PositionManagerAddress,
    resource: &Value,
    collaterals: &[AccountAddress],
    ltv_configs: &[Value],
) -> Result<PositionManagerMetadata, ResolutionError> {
    if collaterals.len() != ltv_configs.len() {
        return Err(ResolutionError::LengthMismatch {
            expected: collaterals.len(),
            actual: ltv_configs.len(),
        });
    }

    let collaterals = collaterals
        .iter()
        .zip(ltv_configs)
        .map(|(asset, config)| {
            Ok(CollateralLtv {
                collateral_asset: (*asset).into(),
                ltv_config: decode_ltv_config(config)?,
            })
        })
        .collect::<Result<Vec<_>, ResolutionError>>()?;

    Ok(PositionManagerMetadata {
        address: manager,
        oracle: move_json::address_field(resource, "oracle")?,
        managed_vault: move_json::address_field(resource, "borrow_vault")?.into(),
        unit_decimals: move_json::as_u8(move_json::field(resource, "unit_decimals")?, "unit_decimals")?,
        collaterals,
    })
}
