//! Liquidity pool and staker-share types.
//!
//! Every pool pairs the base asset (the native settlement asset) with one
//! other asset. `PoolUnits` is the liquidity-share supply; it is zero iff
//! both balances are zero.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, Amount, Asset, Result, TidepoolError};

/// Lifecycle status of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolStatus {
    /// Accepting liquidity, not yet swappable.
    Bootstrap,
    /// Fully operational.
    Enabled,
    /// Frozen by an administrator; no stakes or swaps.
    Suspended,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bootstrap => write!(f, "BOOTSTRAP"),
            Self::Enabled => write!(f, "ENABLED"),
            Self::Suspended => write!(f, "SUSPENDED"),
        }
    }
}

impl FromStr for PoolStatus {
    type Err = TidepoolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bootstrap" => Ok(Self::Bootstrap),
            "enabled" | "active" => Ok(Self::Enabled),
            "suspended" => Ok(Self::Suspended),
            other => Err(TidepoolError::memo(format!("unknown pool status {other:?}"))),
        }
    }
}

/// A liquidity pool pairing the base asset with `asset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub asset: Asset,
    /// Base-asset side of the pool.
    pub balance_rune: Amount,
    /// Paired-asset side of the pool.
    pub balance_asset: Amount,
    /// Outstanding liquidity-share supply.
    pub pool_units: Amount,
    pub status: PoolStatus,
}

impl Pool {
    #[must_use]
    pub fn new(asset: Asset, status: PoolStatus) -> Self {
        Self {
            asset,
            balance_rune: Decimal::ZERO,
            balance_asset: Decimal::ZERO,
            pool_units: Decimal::ZERO,
            status,
        }
    }

    /// Whether the pool holds no liquidity on either side.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.balance_rune.is_zero() && self.balance_asset.is_zero()
    }

    /// Units are zero iff both balances are zero.
    #[must_use]
    pub fn units_invariant_holds(&self) -> bool {
        self.pool_units.is_zero() == self.is_empty()
    }

    /// Price of one asset unit in base units, if the pool is priced.
    #[must_use]
    pub fn asset_price_in_rune(&self) -> Option<Decimal> {
        if self.balance_asset.is_zero() {
            return None;
        }
        self.balance_rune.checked_div(self.balance_asset)
    }

    /// Value of a base-asset amount in pool asset units, floored.
    #[must_use]
    pub fn rune_value_in_asset(&self, rune: Amount) -> Amount {
        if self.balance_rune.is_zero() {
            return Decimal::ZERO;
        }
        rune.checked_mul(self.balance_asset)
            .and_then(|v| v.checked_div(self.balance_rune))
            .map_or(Decimal::ZERO, |v| v.floor())
    }

    /// Value of an asset amount in base units, floored.
    #[must_use]
    pub fn asset_value_in_rune(&self, asset: Amount) -> Amount {
        if self.balance_asset.is_zero() {
            return Decimal::ZERO;
        }
        asset
            .checked_mul(self.balance_rune)
            .and_then(|v| v.checked_div(self.balance_asset))
            .map_or(Decimal::ZERO, |v| v.floor())
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pool[{}] rune={} asset={} units={} {}",
            self.asset, self.balance_rune, self.balance_asset, self.pool_units, self.status
        )
    }
}

/// One staker's share of one pool, keyed by the staker's base-asset address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakerUnit {
    pub asset: Asset,
    pub rune_address: Address,
    /// Address on the asset's chain, fixed by the first stake that names one.
    pub asset_address: Option<Address>,
    pub units: Amount,
    /// Base-asset deposit waiting for its matching asset-side deposit.
    pub pending_rune: Amount,
    /// Processing height of the last change.
    pub height: u64,
}

impl StakerUnit {
    #[must_use]
    pub fn new(asset: Asset, rune_address: Address) -> Self {
        Self {
            asset,
            rune_address,
            asset_address: None,
            units: Decimal::ZERO,
            pending_rune: Decimal::ZERO,
            height: 0,
        }
    }

    /// Whether the record carries neither units nor pending deposits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_zero() && self.pending_rune.is_zero()
    }
}
