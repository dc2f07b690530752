//! Ledger-backed resolvers and sources for the lending protocol.
//!
//! - [`FungibleAssetResolver`], [`VaultResolver`] and [`PositionManagerResolver`]
//!   feed the metadata caches.
//! - [`AptosLedger`] implements [`LedgerSource`] for the volatile state:
//!   reserves, interest rates, positions, balances and oracle quotes.

pub mod client;
pub mod fungible_asset;
pub mod ledger;
pub mod move_json;
pub mod position_manager;
pub mod vault;

use vaultlens_common::types::AccountAddress;

pub use client::AptosClient;
pub use fungible_asset::FungibleAssetResolver;
pub use ledger::{AptosLedger, LedgerSource};
pub use position_manager::PositionManagerResolver;
pub use vault::VaultResolver;

/// Address the protocol's Move modules are published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protocol {
    address: AccountAddress,
}

impl Protocol {
    pub fn new(address: AccountAddress) -> Self {
        Self { address }
    }

    pub fn address(&self) -> AccountAddress {
        self.address
    }

    /// Fully qualified `address::module::name` identifier.
    pub fn member(&self, module: &str, name: &str) -> String {
        format!("{}::{}::{}", self.address, module, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_uses_canonical_address() {
        let protocol = Protocol::new("0x48583e".parse().unwrap());
        assert_eq!(
            protocol.member("vault", "latest_state"),
            format!("0x{:0>64}::vault::latest_state", "48583e")
        );
    }
}
