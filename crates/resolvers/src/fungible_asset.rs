//! Fungible asset metadata from the GraphQL indexer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use vaultlens_cache::Resolver;
use vaultlens_common::error::ResolutionError;
use vaultlens_common::types::{AssetAddress, AssetMetadata, ResolverKind};

use crate::client::AptosClient;
use crate::move_json;

const ASSET_METADATA_QUERY: &str = r#"
query FungibleAssetMetadata($asset_types: [String!]) {
  fungible_asset_metadata(where: { asset_type: { _in: $asset_types } }) {
    asset_type
    name
    symbol
    decimals
    icon_uri
    project_uri
  }
}
"#;

/// Resolves a whole batch of assets with a single indexer query.
pub struct FungibleAssetResolver {
    client: Arc<AptosClient>,
}

impl FungibleAssetResolver {
    pub fn new(client: Arc<AptosClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resolver<AssetAddress, AssetMetadata> for FungibleAssetResolver {
    fn kind(&self) -> ResolverKind {
        ResolverKind::FungibleAsset
    }

    async fn resolve(&self, keys: &[AssetAddress]) -> Result<Vec<AssetMetadata>, ResolutionError> {
        let data = self
            .client
            .graphql(ASSET_METADATA_QUERY, json!({ "asset_types": query_forms(keys) }))
            .await?;
        let rows = move_json::field(&data, "fungible_asset_metadata")?;
        order_rows(rows, keys)
    }
}

/// The indexer stores some asset types with leading zeros trimmed, so both
/// spellings are queried.
pub(crate) fn query_forms(keys: &[AssetAddress]) -> Vec<String> {
    let mut forms = Vec::with_capacity(keys.len() * 2);
    for key in keys {
        let long = key.to_string();
        let digits = long.trim_start_matches("0x").trim_start_matches('0');
        let short = format!("0x{}", if digits.is_empty() { "0" } else { digits });
        if short != long {
            forms.push(short);
        }
        forms.push(long);
    }
    forms
}

fn decode_row(row: &Value) -> Result<AssetMetadata, ResolutionError> {
    let optional = |name: &str| row.get(name).and_then(Value::as_str).map(str::to_string);

    Ok(AssetMetadata {
        asset_type: move_json::address_field(row, "asset_type")?.into(),
        name: move_json::as_string(move_json::field(row, "name")?, "name")?,
        symbol: move_json::as_string(move_json::field(row, "symbol")?, "symbol")?,
        decimals: move_json::as_u8(move_json::field(row, "decimals")?, "decimals")?,
        icon_uri: optional("icon_uri").filter(|s| !s.is_empty()),
        project_uri: optional("project_uri").filter(|s| !s.is_empty()),
    })
}

/// Match indexer rows back to the requested keys, in key order.
///
/// Rows whose `asset_type` is not an address (legacy coin types) are ignored;
/// a requested key with no row fails the batch.
pub fn order_rows(
    rows: &Value,
    keys: &[AssetAddress],
) -> Result<Vec<AssetMetadata>, ResolutionError> {
    let mut by_asset = HashMap::new();
    for row in move_json::as_array(rows, "fungible_asset_metadata")? {
        match decode_row(row) {
            Ok(meta) => {
                by_asset.insert(meta.asset_type, meta);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Skipping undecodable asset metadata row");
            }
        }
    }

    keys.iter()
        .map(|key| {
            by_asset
                .get(key)
                .cloned()
                .ok_or_else(|| ResolutionError::NotFound(format!("fungible asset {key}")))
        })
        .collect()
}
