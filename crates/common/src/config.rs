use serde::Deserialize;

use crate::types::AccountAddress;

/// Default safety buffer, in parts-per-100,000, kept below the adjust LTV
/// when computing the maximum withdrawable collateral.
pub const DEFAULT_WITHDRAW_MARGIN: u32 = 10;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Aptos fullnode REST endpoint (ends in `/v1`)
    pub aptos_node_url: String,

    /// Aptos indexer GraphQL endpoint
    pub aptos_indexer_url: String,

    /// Optional API key sent as a bearer token to both endpoints
    pub aptos_api_key: Option<String>,

    /// Address the lending protocol modules are published under
    pub protocol_address: AccountAddress,

    /// Port the HTTP API listens on (default: 3000)
    pub api_port: u16,

    /// Per-request timeout for ledger calls in milliseconds (default: 10000)
    pub http_timeout_ms: u64,

    /// Age in seconds after which the API starts a fresh metadata scope (default: 300)
    pub metadata_stale_secs: u64,

    /// Withdraw safety margin in parts-per-100,000 (default: 10)
    pub withdraw_margin: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let protocol_address = std::env::var("PROTOCOL_ADDRESS")
            .map_err(|_| anyhow::anyhow!("PROTOCOL_ADDRESS environment variable is required"))?;

        Ok(Self {
            aptos_node_url: std::env::var("APTOS_NODE_URL")
                .unwrap_or_else(|_| "https://fullnode.mainnet.aptoslabs.com/v1".to_string()),
            aptos_indexer_url: std::env::var("APTOS_INDEXER_URL")
                .unwrap_or_else(|_| "https://api.mainnet.aptoslabs.com/v1/graphql".to_string()),
            aptos_api_key: std::env::var("APTOS_API_KEY").ok(),
            protocol_address: protocol_address
                .parse()
                .map_err(|e| anyhow::anyhow!("PROTOCOL_ADDRESS is invalid: {e}"))?,
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("API_PORT must be a valid u16"))?,
            http_timeout_ms: std::env::var("HTTP_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("HTTP_TIMEOUT_MS must be a valid u64"))?,
            metadata_stale_secs: std::env::var("METADATA_STALE_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("METADATA_STALE_SECS must be a valid u64"))?,
            withdraw_margin: std::env::var("WITHDRAW_MARGIN")
                .unwrap_or_else(|_| DEFAULT_WITHDRAW_MARGIN.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WITHDRAW_MARGIN must be a valid u32"))?,
        })
    }
}
