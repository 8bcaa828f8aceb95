//! Pool book: every pool, its stakers, and the reverse staker index.
//!
//! Each mutating operation works on copies of the records it touches and
//! writes them back only once every step has succeeded, so an error leaves
//! the book exactly as it was.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::Serialize;
use tidepool_types::{
    Address, Amount, Asset, Coin, Pool, PoolStatus, Result, StakerUnit, TidepoolError,
};

use crate::math;

/// Result of a stake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeOutcome {
    /// Units issued by this stake (zero while pending).
    pub units: Amount,
    /// Base-asset deposit parked until the asset side arrives.
    pub pending: bool,
    /// Base asset actually added to the pool, including any matched pending deposit.
    pub rune_added: Amount,
    pub asset_added: Amount,
}

/// Result of an unstake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnstakeOutcome {
    pub rune: Amount,
    pub asset: Amount,
    pub units_removed: Amount,
    pub remaining_units: Amount,
    /// Recorded asset-chain address of the staker, if any.
    pub asset_address: Option<Address>,
}

/// One pool update of a swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapLeg {
    pub pool: Asset,
    pub input: Coin,
    pub output: Coin,
    pub liquidity_fee: Amount,
    pub trade_slip: Amount,
}

/// Result of a (possibly two-leg) swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    pub output: Coin,
    pub legs: Vec<SwapLeg>,
}

/// All pools paired against one base asset.
#[derive(Debug, Clone)]
pub struct PoolBook {
    base_asset: Asset,
    default_status: PoolStatus,
    pools: BTreeMap<Asset, Pool>,
    /// Staker records per pool, keyed by base-asset address.
    stakers: BTreeMap<Asset, BTreeMap<Address, StakerUnit>>,
    /// Pools each staker holds a record in.
    staker_pools: BTreeMap<Address, BTreeSet<Asset>>,
}

impl PoolBook {
    #[must_use]
    pub fn new(base_asset: Asset, default_status: PoolStatus) -> Self {
        Self {
            base_asset,
            default_status,
            pools: BTreeMap::new(),
            stakers: BTreeMap::new(),
            staker_pools: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn base_asset(&self) -> &Asset {
        &self.base_asset
    }

    // -----------------------------------------------------------------
    // Pools
    // -----------------------------------------------------------------

    /// Create an empty pool for `asset` with the default status.
    ///
    /// # Errors
    /// - `InvalidAsset` if `asset` is the base asset
    /// - `PoolAlreadyExists` if the pool exists
    pub fn create_pool(&mut self, asset: &Asset) -> Result<&Pool> {
        if *asset == self.base_asset {
            return Err(TidepoolError::InvalidAsset(format!(
                "{asset} is the base asset and cannot have a pool"
            )));
        }
        if self.pools.contains_key(asset) {
            return Err(TidepoolError::PoolAlreadyExists(asset.clone()));
        }
        let status = self.default_status;
        tracing::info!(pool = %asset, %status, "pool created");
        Ok(self
            .pools
            .entry(asset.clone())
            .or_insert_with(|| Pool::new(asset.clone(), status)))
    }

    #[must_use]
    pub fn pool(&self, asset: &Asset) -> Option<&Pool> {
        self.pools.get(asset)
    }

    #[must_use]
    pub fn pool_exists(&self, asset: &Asset) -> bool {
        self.pools.contains_key(asset)
    }

    pub fn pools(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }

    pub fn set_status(&mut self, asset: &Asset, status: PoolStatus) -> Result<()> {
        let pool = self
            .pools
            .get_mut(asset)
            .ok_or_else(|| TidepoolError::PoolNotFound(asset.clone()))?;
        tracing::info!(pool = %asset, from = %pool.status, to = %status, "pool status changed");
        pool.status = status;
        Ok(())
    }

    fn pool_for(&self, asset: &Asset) -> Result<Pool> {
        self.pools
            .get(asset)
            .cloned()
            .ok_or_else(|| TidepoolError::PoolNotFound(asset.clone()))
    }

    // -----------------------------------------------------------------
    // Stake / unstake
    // -----------------------------------------------------------------

    /// Deposit `rune` and `asset_amount` into `asset`'s pool on behalf of
    /// `rune_address`.
    ///
    /// On a pool whose asset lives on another chain than the base asset, a
    /// deposit with no asset side is parked as pending and issues no units;
    /// the next deposit with an asset side consumes it.
    ///
    /// # Errors
    /// - `PoolNotFound`, `PoolUnavailable` (suspended)
    /// - `EmptyStake` if both sides are zero
    /// - `StakerAddressMismatch` if `asset_address` differs from the recorded one
    /// - `MathPrecondition` if either pool side would remain zero
    pub fn stake(
        &mut self,
        asset: &Asset,
        rune: Amount,
        asset_amount: Amount,
        rune_address: &Address,
        asset_address: Option<&Address>,
        height: u64,
    ) -> Result<StakeOutcome> {
        let mut pool = self.pool_for(asset)?;
        if pool.status == PoolStatus::Suspended {
            return Err(TidepoolError::PoolUnavailable {
                asset: asset.clone(),
                reason: "pool is suspended".to_string(),
            });
        }
        if rune.is_zero() && asset_amount.is_zero() {
            return Err(TidepoolError::EmptyStake);
        }

        let mut record = self
            .staker(asset, rune_address)
            .cloned()
            .unwrap_or_else(|| StakerUnit::new(asset.clone(), rune_address.clone()));
        match (&record.asset_address, asset_address) {
            (Some(recorded), Some(supplied)) if recorded != supplied => {
                return Err(TidepoolError::StakerAddressMismatch {
                    recorded: recorded.clone(),
                    supplied: supplied.clone(),
                });
            }
            (None, Some(supplied)) => record.asset_address = Some(supplied.clone()),
            _ => {}
        }
        record.height = height;

        let mut rune = rune;
        if asset.chain != self.base_asset.chain {
            if asset_amount.is_zero() {
                record.pending_rune += rune;
                tracing::info!(pool = %asset, staker = %rune_address, pending = %record.pending_rune, "stake pending asset side");
                self.put_staker(record);
                return Ok(StakeOutcome {
                    units: Decimal::ZERO,
                    pending: true,
                    rune_added: Decimal::ZERO,
                    asset_added: Decimal::ZERO,
                });
            }
            rune += record.pending_rune;
            record.pending_rune = Decimal::ZERO;
        }

        let units = math::calculate_pool_units(pool.balance_rune, pool.balance_asset, rune, asset_amount)?;
        pool.balance_rune += rune;
        pool.balance_asset += asset_amount;
        pool.pool_units += units;
        if !pool.units_invariant_holds() {
            return Err(TidepoolError::math("stake too small to issue any units"));
        }
        record.units += units;

        tracing::info!(pool = %asset, staker = %rune_address, %units, %rune, asset = %asset_amount, "stake applied");
        self.pools.insert(asset.clone(), pool);
        self.put_staker(record);
        Ok(StakeOutcome {
            units,
            pending: false,
            rune_added: rune,
            asset_added: asset_amount,
        })
    }

    /// Withdraw `basis_points` / 10000 of `rune_address`'s position.
    ///
    /// A record left with zero units and nothing pending is removed.
    ///
    /// # Errors
    /// - `PoolNotFound`
    /// - `NothingToWithdraw` if the staker holds no units
    /// - `InvalidBasisPoints`, `MathPrecondition` from the unstake formula
    pub fn unstake(
        &mut self,
        asset: &Asset,
        rune_address: &Address,
        basis_points: u64,
        height: u64,
    ) -> Result<UnstakeOutcome> {
        let mut pool = self.pool_for(asset)?;
        let mut record = self
            .staker(asset, rune_address)
            .filter(|s| s.units > Decimal::ZERO)
            .cloned()
            .ok_or_else(|| TidepoolError::NothingToWithdraw(rune_address.clone()))?;

        let out = math::calculate_unstake(
            pool.pool_units,
            pool.balance_rune,
            pool.balance_asset,
            record.units,
            basis_points,
        )?;
        pool.pool_units -= out.units_removed;
        pool.balance_rune -= out.rune;
        pool.balance_asset -= out.asset;
        if !pool.units_invariant_holds() {
            return Err(TidepoolError::math("unstake would leave pool balances without units"));
        }
        record.units = out.remaining_units;
        record.height = height;
        let asset_address = record.asset_address.clone();

        tracing::info!(pool = %asset, staker = %rune_address, basis_points, rune = %out.rune, asset = %out.asset, "unstake applied");
        self.pools.insert(asset.clone(), pool);
        self.put_staker(record);
        Ok(UnstakeOutcome {
            rune: out.rune,
            asset: out.asset,
            units_removed: out.units_removed,
            remaining_units: out.remaining_units,
            asset_address,
        })
    }

    /// Store a staker record, dropping it (and its index entry) when empty.
    fn put_staker(&mut self, record: StakerUnit) {
        let asset = record.asset.clone();
        let address = record.rune_address.clone();
        if record.is_empty() {
            if let Some(stakers) = self.stakers.get_mut(&asset) {
                stakers.remove(&address);
            }
            if let Some(pools) = self.staker_pools.get_mut(&address) {
                pools.remove(&asset);
                if pools.is_empty() {
                    self.staker_pools.remove(&address);
                }
            }
        } else {
            self.stakers
                .entry(asset.clone())
                .or_default()
                .insert(address.clone(), record);
            self.staker_pools.entry(address).or_default().insert(asset);
        }
    }

    #[must_use]
    pub fn staker(&self, asset: &Asset, rune_address: &Address) -> Option<&StakerUnit> {
        self.stakers.get(asset)?.get(rune_address)
    }

    /// Every staker record of a pool, by address.
    pub fn stakers(&self, asset: &Asset) -> impl Iterator<Item = &StakerUnit> {
        self.stakers.get(asset).into_iter().flat_map(BTreeMap::values)
    }

    /// Pools in which `address` holds units or a pending deposit.
    #[must_use]
    pub fn pools_of(&self, address: &Address) -> BTreeSet<Asset> {
        self.staker_pools.get(address).cloned().unwrap_or_default()
    }

    // -----------------------------------------------------------------
    // Swaps
    // -----------------------------------------------------------------

    /// Swap `input` for `target`, routing through the base asset when
    /// neither side is the base asset.
    ///
    /// The trade target is checked against the gross pool output. Zero
    /// disables the check.
    ///
    /// # Errors
    /// - `InvalidMemo` if source and target are the same asset
    /// - `PoolNotFound`, `PoolUnavailable` (not enabled)
    /// - `MathPrecondition` for empty pools or a zero output
    /// - `TradeTargetNotMet` if the output is below `trade_target`
    pub fn swap(&mut self, input: &Coin, target: &Asset, trade_target: Amount) -> Result<SwapOutcome> {
        if input.asset == *target {
            return Err(TidepoolError::memo(format!("cannot swap {target} for itself")));
        }
        let route: Vec<Asset> = if input.asset == self.base_asset {
            vec![target.clone()]
        } else if *target == self.base_asset {
            vec![input.asset.clone()]
        } else {
            vec![input.asset.clone(), target.clone()]
        };

        let mut touched = Vec::with_capacity(route.len());
        let mut legs = Vec::with_capacity(route.len());
        let mut carry = input.clone();
        for pool_asset in &route {
            let mut pool = self.pool_for(pool_asset)?;
            if pool.status != PoolStatus::Enabled {
                return Err(TidepoolError::PoolUnavailable {
                    asset: pool_asset.clone(),
                    reason: format!("pool is {}", pool.status),
                });
            }
            let leg = swap_leg(&mut pool, &carry, &self.base_asset)?;
            carry = leg.output.clone();
            legs.push(leg);
            touched.push(pool);
        }

        if carry.amount.is_zero() {
            return Err(TidepoolError::math("swap output is zero"));
        }
        if !trade_target.is_zero() && carry.amount < trade_target {
            return Err(TidepoolError::TradeTargetNotMet {
                target: trade_target,
                output: carry.amount,
            });
        }

        for pool in touched {
            self.pools.insert(pool.asset.clone(), pool);
        }
        tracing::info!(from = %input, to = %carry, legs = legs.len(), "swap applied");
        Ok(SwapOutcome { output: carry, legs })
    }

    // -----------------------------------------------------------------
    // Balance adjustments
    // -----------------------------------------------------------------

    /// Donate liquidity to a pool without issuing units.
    ///
    /// # Errors
    /// `MathPrecondition` if the pool has no units to own the donation.
    pub fn add_liquidity(&mut self, asset: &Asset, rune: Amount, asset_amount: Amount) -> Result<()> {
        let mut pool = self.pool_for(asset)?;
        if pool.pool_units.is_zero() {
            return Err(TidepoolError::math("cannot add liquidity to a pool without units"));
        }
        pool.balance_rune += rune;
        pool.balance_asset += asset_amount;
        tracing::info!(pool = %asset, %rune, asset = %asset_amount, "liquidity added");
        self.pools.insert(asset.clone(), pool);
        Ok(())
    }

    /// Return `fee_asset` of the pool's asset to the pool and release its
    /// base-asset value from the pool. Returns the released base amount.
    pub fn collect_fee(&mut self, asset: &Asset, fee_asset: Amount) -> Result<Amount> {
        let pool = self
            .pools
            .get_mut(asset)
            .ok_or_else(|| TidepoolError::PoolNotFound(asset.clone()))?;
        let rune = pool.asset_value_in_rune(fee_asset).min(pool.balance_rune);
        pool.balance_asset += fee_asset;
        pool.balance_rune -= rune;
        Ok(rune)
    }

    /// The gas asset's pool pays `gas` and is credited `rune` in exchange.
    /// Returns the gas actually taken from the pool, capped at its balance.
    /// A missing pool pays nothing.
    pub fn pay_gas(&mut self, gas_asset: &Asset, gas: Amount, rune: Amount) -> Amount {
        let Some(pool) = self.pools.get_mut(gas_asset) else {
            return Decimal::ZERO;
        };
        let paid = gas.min(pool.balance_asset);
        pool.balance_asset -= paid;
        pool.balance_rune += rune;
        paid
    }

    /// Remove stolen asset from the pool and credit base asset recovered
    /// from the thief's bond.
    pub fn cover_loss(&mut self, asset: &Asset, stolen: Amount, rune: Amount) {
        if let Some(pool) = self.pools.get_mut(asset) {
            pool.balance_asset -= stolen.min(pool.balance_asset);
            pool.balance_rune += rune;
        }
    }

    /// Base-asset value of `amount` of `asset` at the current pool price.
    /// The base asset is its own value; unpriced assets are worth zero.
    #[must_use]
    pub fn value_in_rune(&self, asset: &Asset, amount: Amount) -> Amount {
        if *asset == self.base_asset {
            return amount;
        }
        self.pools
            .get(asset)
            .map_or(Decimal::ZERO, |p| p.asset_value_in_rune(amount))
    }

    /// `rune` converted to `asset` at the current pool price.
    #[must_use]
    pub fn rune_in_asset(&self, asset: &Asset, rune: Amount) -> Amount {
        if *asset == self.base_asset {
            return rune;
        }
        self.pools
            .get(asset)
            .map_or(Decimal::ZERO, |p| p.rune_value_in_asset(rune))
    }
}

/// Apply one swap leg to `pool`.
fn swap_leg(pool: &mut Pool, input: &Coin, base: &Asset) -> Result<SwapLeg> {
    let rune_in = input.asset == *base;
    if !rune_in && input.asset != pool.asset {
        return Err(TidepoolError::InvalidAsset(format!(
            "{} cannot be swapped in pool {}",
            input.asset, pool.asset
        )));
    }
    let (x_balance, y_balance) = if rune_in {
        (pool.balance_rune, pool.balance_asset)
    } else {
        (pool.balance_asset, pool.balance_rune)
    };

    let output = math::calculate_swap_output(input.amount, x_balance, y_balance)?;
    let liquidity_fee = math::calculate_liquidity_fee(input.amount, x_balance, y_balance)?;
    let trade_slip = math::calculate_trade_slip(input.amount, x_balance)?;

    let output_asset = if rune_in {
        pool.balance_rune += input.amount;
        pool.balance_asset -= output;
        pool.asset.clone()
    } else {
        pool.balance_asset += input.amount;
        pool.balance_rune -= output;
        base.clone()
    };

    Ok(SwapLeg {
        pool: pool.asset.clone(),
        input: input.clone(),
        output: Coin::new(output_asset, output),
        liquidity_fee,
        trade_slip,
    })
}
