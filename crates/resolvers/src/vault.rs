//! Vault configuration metadata.
//!
//! A vault's addresses are spread over two resources and two view functions:
//! `vault::VaultMetadata`, `vault::underlying_asset`,
//! `vault_configuration::VaultConfig` and `vault_configuration::get_borrow_manager`.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::{Value, json};

use vaultlens_cache::Resolver;
use vaultlens_common::error::ResolutionError;
use vaultlens_common::types::{ResolverKind, VaultAddress, VaultMetadata};

use crate::client::AptosClient;
use crate::{Protocol, move_json};

pub struct VaultResolver {
    client: Arc<AptosClient>,
    protocol: Protocol,
}

impl VaultResolver {
    pub fn new(client: Arc<AptosClient>, protocol: Protocol) -> Self {
        Self { client, protocol }
    }

    async fn fetch(&self, vault: VaultAddress) -> Result<VaultMetadata, ResolutionError> {
        let address = vault.address();
        let underlying_fn = self.protocol.member("vault", "underlying_asset");
        let metadata_type = self.protocol.member("vault", "VaultMetadata");
        let (metadata, underlying) = futures::try_join!(
            self.client.resource(address, &metadata_type),
            self.client
                .view(&underlying_fn, &[], vec![json!(address.to_string())]),
        )?;
        let underlying = move_json::first(underlying, &underlying_fn)?;

        let config_address = move_json::address_field(&metadata, "config")?;
        let borrow_manager_fn = self
            .protocol
            .member("vault_configuration", "get_borrow_manager");
        let config_type = self.protocol.member("vault_configuration", "VaultConfig");
        let borrow_manager_type_args = [self
            .protocol
            .member("position_manager", "PositionManagerMetadata")];
        let (config, borrow_manager) = futures::try_join!(
            self.client.resource(config_address, &config_type),
            self.client.view(
                &borrow_manager_fn,
                &borrow_manager_type_args,
                vec![json!(config_address.to_string())],
            ),
        )?;
        let borrow_manager = move_json::first(borrow_manager, &borrow_manager_fn)?;

        decode_vault_metadata(vault, &metadata, &underlying, &config, &borrow_manager)
    }
}

#[async_trait]
impl Resolver<VaultAddress, VaultMetadata> for VaultResolver {
    fn kind(&self) -> ResolverKind {
        ResolverKind::Vault
    }

    async fn resolve(&self, keys: &[VaultAddress]) -> Result<Vec<VaultMetadata>, ResolutionError> {
        try_join_all(keys.iter().map(|vault| self.fetch(*vault))).await
    }
}

pub fn decode_vault_metadata(
    vault: VaultAddress,
    metadata: &Value,
    underlying_asset: &Value,
    config: &Value,
    borrow_manager: &Value,
) -> Result<VaultMetadata, ResolutionError> {
    let borrow_manager = match move_json::option_inner(borrow_manager, "borrow_manager")? {
        Some(value) => Some(move_json::as_address(value, "borrow_manager")?.into()),
        None => None,
    };

    Ok(VaultMetadata {
        vault,
        governance: move_json::address_field(metadata, "governance")?,
        vault_asset: move_json::address_field(metadata, "vault_asset")?.into(),
        debt_asset: move_json::address_field(metadata, "debt_asset")?.into(),
        underlying_asset: move_json::as_address(underlying_asset, "underlying_asset")?.into(),
        underlying_asset_store: move_json::address_field(metadata, "underlying_asset_store")?,
        interest_fee_store: move_json::address_field(metadata, "interest_fee_store")?,
        config_address: move_json::address_field(metadata, "config")?,
        irm_address: move_json::address_field(config, "irm")?,
        borrow_manager,
    })
}
