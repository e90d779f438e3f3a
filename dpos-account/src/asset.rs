//! Asset registry entries: issuer, kind, supply, and their own permission bitmap.

use crate::perms::{PermsSum, ALL_PERMS};
use dpos_core::ids::{RegId, TokenSymbol};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    /// Native issued asset (the chain's own coin family).
    Nia,
    /// DEX-issued asset.
    Dia,
    /// User-issued asset.
    Uia,
    /// Miner-pegged (stablecoin) asset.
    Mpa,
}

pub const ASSET_PERM_CDP_BCOIN: PermsSum = 1 << 0;
pub const ASSET_PERM_PRICE_FEEDABLE: PermsSum = 1 << 1;
pub const ASSET_PERM_DEX_BASE: PermsSum = 1 << 2;
pub const ASSET_PERM_DEX_QUOTE: PermsSum = 1 << 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: TokenSymbol,
    pub issuer: RegId,
    pub kind: AssetKind,
    pub total_supply: u64,
    pub perms_sum: PermsSum,
}

impl Asset {
    pub fn new(symbol: TokenSymbol, issuer: RegId, kind: AssetKind, total_supply: u64) -> Self {
        Asset { symbol, issuer, kind, total_supply, perms_sum: ALL_PERMS }
    }

    pub fn check_perms(&self, required: PermsSum) -> bool {
        crate::perms::check_perms(self.perms_sum, required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_asset_has_all_perms() {
        let asset = Asset::new(
            TokenSymbol::new("WUSD").unwrap(),
            RegId::new(1, 0),
            AssetKind::Mpa,
            0,
        );
        assert!(asset.check_perms(ASSET_PERM_PRICE_FEEDABLE));
    }
}
