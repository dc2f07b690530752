//! Shared application state for the Axum API server.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use vaultlens_cache::{MetadataCache, Resolver};
use vaultlens_common::config::AppConfig;
use vaultlens_common::error::AppError;
use vaultlens_common::types::{
    AssetAddress, AssetMetadata, PositionManagerAddress, PositionManagerMetadata, VaultAddress,
    VaultMetadata,
};
use vaultlens_engine::RiskEngine;
use vaultlens_resolvers::{
    AptosClient, AptosLedger, FungibleAssetResolver, LedgerSource, PositionManagerResolver,
    Protocol, VaultResolver,
};

/// The resolvers a [`MetadataScope`] is built from.
#[derive(Clone)]
pub struct Resolvers {
    pub assets: Arc<dyn Resolver<AssetAddress, AssetMetadata>>,
    pub vaults: Arc<dyn Resolver<VaultAddress, VaultMetadata>>,
    pub position_managers: Arc<dyn Resolver<PositionManagerAddress, PositionManagerMetadata>>,
}

/// One generation of metadata caches. Entries never expire inside a scope;
/// the whole scope is replaced once it is older than the staleness window.
#[derive(Clone)]
pub struct MetadataScope {
    pub assets: MetadataCache<AssetAddress, AssetMetadata>,
    pub vaults: MetadataCache<VaultAddress, VaultMetadata>,
    pub position_managers: MetadataCache<PositionManagerAddress, PositionManagerMetadata>,
    created_at: Instant,
}

impl MetadataScope {
    pub fn new(resolvers: &Resolvers) -> Self {
        Self {
            assets: MetadataCache::new(Arc::clone(&resolvers.assets)),
            vaults: MetadataCache::new(Arc::clone(&resolvers.vaults)),
            position_managers: MetadataCache::new(Arc::clone(&resolvers.position_managers)),
            created_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub ledger: Arc<dyn LedgerSource>,
    pub risk: RiskEngine,
    resolvers: Resolvers,
    scope: Arc<RwLock<MetadataScope>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        ledger: Arc<dyn LedgerSource>,
        resolvers: Resolvers,
    ) -> Result<Self, AppError> {
        let risk = RiskEngine::new(config.withdraw_margin)?;
        let scope = MetadataScope::new(&resolvers);
        Ok(Self {
            config,
            ledger,
            risk,
            resolvers,
            scope: Arc::new(RwLock::new(scope)),
        })
    }

    /// Wire the Aptos-backed resolvers and ledger for `config`.
    pub fn connect(config: AppConfig) -> anyhow::Result<Self> {
        let client = Arc::new(AptosClient::new(&config)?);
        let protocol = Protocol::new(config.protocol_address);

        let resolvers = Resolvers {
            assets: Arc::new(FungibleAssetResolver::new(Arc::clone(&client))),
            vaults: Arc::new(VaultResolver::new(Arc::clone(&client), protocol)),
            position_managers: Arc::new(PositionManagerResolver::new(
                Arc::clone(&client),
                protocol,
            )),
        };
        let ledger = Arc::new(AptosLedger::new(client, protocol));

        Ok(Self::new(config, ledger, resolvers)?)
    }

    fn stale_after(&self) -> Duration {
        Duration::from_secs(self.config.metadata_stale_secs)
    }

    /// The current metadata scope, replaced first if it has gone stale.
    ///
    /// Handlers take one scope per request and use it throughout, so a
    /// single response never mixes two generations.
    pub fn metadata(&self) -> MetadataScope {
        {
            let scope = self.scope.read().unwrap_or_else(PoisonError::into_inner);
            if scope.age() < self.stale_after() {
                return scope.clone();
            }
        }

        let mut scope = self.scope.write().unwrap_or_else(PoisonError::into_inner);
        // Another request may have replaced it while we waited for the lock.
        if scope.age() >= self.stale_after() {
            tracing::info!(
                age_secs = scope.age().as_secs(),
                entries = scope.assets.len() + scope.vaults.len() + scope.position_managers.len(),
                "Metadata scope is stale, starting a fresh one"
            );
            *scope = MetadataScope::new(&self.resolvers);
        }
        scope.clone()
    }
}
