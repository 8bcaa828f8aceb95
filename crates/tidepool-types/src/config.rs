//! Configuration for the Tidepool settlement core.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{constants, Address, Amount, Asset, PoolStatus, Result, TidepoolError};

/// Supermajority fraction required to finalize an observation.
///
/// A variant reaches quorum when `signers * denominator > active * numerator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumFraction {
    pub numerator: u64,
    pub denominator: u64,
}

impl QuorumFraction {
    #[must_use]
    pub const fn new(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Strict `2/3` supermajority.
    #[must_use]
    pub const fn two_thirds() -> Self {
        Self::new(
            constants::DEFAULT_QUORUM_NUMERATOR,
            constants::DEFAULT_QUORUM_DENOMINATOR,
        )
    }

    /// Does `signers` out of `active` nodes strictly exceed the fraction?
    ///
    /// Always false when there are no active nodes.
    #[must_use]
    pub fn has_majority(&self, signers: usize, active: usize) -> bool {
        if active == 0 {
            return false;
        }
        let lhs = (signers as u128) * u128::from(self.denominator);
        let rhs = (active as u128) * u128::from(self.numerator);
        lhs > rhs
    }

    /// Fractions must lie in `[1/2, 1)`.
    pub fn validate(&self) -> Result<()> {
        if self.denominator == 0 {
            return Err(TidepoolError::Configuration(
                "quorum denominator cannot be zero".to_string(),
            ));
        }
        if self.numerator.saturating_mul(2) < self.denominator || self.numerator >= self.denominator {
            return Err(TidepoolError::Configuration(format!(
                "quorum fraction {}/{} must be in [1/2, 1)",
                self.numerator, self.denominator
            )));
        }
        Ok(())
    }
}

impl Default for QuorumFraction {
    fn default() -> Self {
        Self::two_thirds()
    }
}

/// Settlement-wide parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Native settlement asset every pool is paired against.
    pub base_asset: Asset,
    pub quorum: QuorumFraction,
    /// Fixed per-transaction fee, in base-asset units.
    pub transaction_fee: Amount,
    /// Status given to newly created pools.
    pub default_pool_status: PoolStatus,
    /// Divisor of the gas estimate moving average.
    pub gas_smoothing_weight: u64,
    /// Bond slashed per unit of stolen value, in basis points.
    pub slash_multiplier_bps: u64,
    /// Senders whose ADMIN memos are honoured.
    pub admin_addresses: BTreeSet<Address>,
    /// Settled outbound in-hashes remembered before the oldest is evicted.
    pub outbound_guard_capacity: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        let base_asset = constants::DEFAULT_BASE_ASSET
            .parse()
            .unwrap_or_else(|_| Asset::bnb());
        Self {
            base_asset,
            quorum: QuorumFraction::default(),
            transaction_fee: Decimal::from(constants::DEFAULT_TRANSACTION_FEE),
            default_pool_status: PoolStatus::Bootstrap,
            gas_smoothing_weight: constants::DEFAULT_GAS_SMOOTHING_WEIGHT,
            slash_multiplier_bps: constants::DEFAULT_SLASH_MULTIPLIER_BPS,
            admin_addresses: BTreeSet::new(),
            outbound_guard_capacity: constants::OUTBOUND_GUARD_CACHE_SIZE,
        }
    }
}

impl SettlementConfig {
    /// Load and validate a JSON configuration document. Missing fields take
    /// their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TidepoolError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.quorum.validate()?;
        if self.transaction_fee.is_sign_negative() {
            return Err(TidepoolError::Configuration(
                "transaction fee cannot be negative".to_string(),
            ));
        }
        if self.gas_smoothing_weight == 0 {
            return Err(TidepoolError::Configuration(
                "gas smoothing weight cannot be zero".to_string(),
            ));
        }
        if self.outbound_guard_capacity == 0 {
            return Err(TidepoolError::Configuration(
                "outbound guard capacity cannot be zero".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_admin(&self, address: &Address) -> bool {
        self.admin_addresses.contains(address)
    }

    #[must_use]
    pub fn is_base_asset(&self, asset: &Asset) -> bool {
        *asset == self.base_asset
    }
}
