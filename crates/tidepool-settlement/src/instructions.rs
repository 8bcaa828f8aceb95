//! Inbound instructions: what a finalized deposit's memo asks for.
//!
//! Each handler runs against a [`Txn`] working copy. Any error aborts the
//! whole instruction; the settler then discards the copy and refunds the
//! deposit instead. A deposit whose refund cannot be staged is held.

use rust_decimal::Decimal;
use tidepool_types::{
    AdminKind, AdminMemo, Address, Asset, Coin, Coins, EventKind, EventStatus, ExternalTx, Memo,
    Observation, Result, TidepoolError,
};

use crate::ledger::Txn;

impl Txn<'_> {
    /// Apply the instruction carried by a finalized inbound observation.
    /// The deposit itself is already credited to the vault.
    pub fn apply_inbound(&mut self, memo: &Memo, obs: &Observation) -> Result<()> {
        let tx = &obs.tx;
        match memo {
            Memo::Create { asset } => self.create(asset, tx),
            Memo::Stake { asset, asset_address } => self.stake(asset, asset_address.as_ref(), tx),
            Memo::Add { asset } => self.add(asset, tx),
            Memo::Withdraw { asset, basis_points } => self.withdraw(asset, *basis_points, tx),
            Memo::Swap {
                asset,
                destination,
                trade_target,
            } => self.swap(asset, destination.as_ref(), *trade_target, tx),
            Memo::Admin(admin) => self.admin(admin, tx),
            Memo::Outbound { .. } | Memo::Refund { .. } => Err(TidepoolError::memo(format!(
                "{} memo on an inbound transaction",
                memo.kind_name()
            ))),
        }
    }

    /// Refund every coin of a failed inbound from the vault that received it.
    pub fn refund_inbound(&mut self, obs: &Observation, cause: &TidepoolError) -> Result<()> {
        let tx = &obs.tx;
        for coin in tx.coins.iter() {
            self.refund(&tx.from_address, coin, &obs.observed_pubkey)?;
        }
        self.emit(
            EventStatus::Refund,
            EventKind::Refund {
                code: error_code(cause),
                reason: cause.to_string(),
                coins: tx.coins.clone(),
            },
        );
        Ok(())
    }

    /// Record a failed inbound whose refund could not be staged. The
    /// deposit stays credited to its vault and is reported as a refund
    /// still pending.
    pub fn hold_inbound(&mut self, obs: &Observation, cause: &TidepoolError, refund_err: &TidepoolError) {
        self.emit(
            EventStatus::Pending,
            EventKind::Refund {
                code: error_code(cause),
                reason: format!("{cause}; refund held: {refund_err}"),
                coins: obs.tx.coins.clone(),
            },
        );
    }

    fn create(&mut self, asset: &Asset, tx: &ExternalTx) -> Result<()> {
        let status = self.state.pools.create_pool(asset)?.status;
        self.emit(
            EventStatus::Success,
            EventKind::Pool {
                pool: asset.clone(),
                status,
            },
        );
        self.stake(asset, None, tx)
    }

    fn stake(&mut self, asset: &Asset, memo_address: Option<&Address>, tx: &ExternalTx) -> Result<()> {
        let (rune, amount) = self.pool_sides(asset, &tx.coins)?;

        // Deposits from the base chain are owned by the sender and may name
        // the asset-chain address; deposits from the asset chain must name
        // the base-chain owner.
        let (rune_address, asset_address) = if tx.chain == self.config.base_asset.chain {
            (tx.from_address.clone(), memo_address.cloned())
        } else {
            let owner = memo_address.cloned().ok_or_else(|| {
                TidepoolError::memo(format!("stake from {} must name the base-chain address", tx.chain))
            })?;
            (owner, Some(tx.from_address.clone()))
        };

        let out = self.state.pools.stake(
            asset,
            rune,
            amount,
            &rune_address,
            asset_address.as_ref(),
            self.height,
        )?;
        let (status, rune_amount) = if out.pending {
            (EventStatus::Pending, rune)
        } else {
            (EventStatus::Success, out.rune_added)
        };
        self.emit(
            status,
            EventKind::Stake {
                pool: asset.clone(),
                staker: rune_address,
                rune_amount,
                asset_amount: out.asset_added,
                units: out.units,
            },
        );
        Ok(())
    }

    fn add(&mut self, asset: &Asset, tx: &ExternalTx) -> Result<()> {
        let (rune, amount) = self.pool_sides(asset, &tx.coins)?;
        self.state.pools.add_liquidity(asset, rune, amount)?;
        self.emit(
            EventStatus::Success,
            EventKind::Add {
                pool: asset.clone(),
                rune_amount: rune,
                asset_amount: amount,
            },
        );
        Ok(())
    }

    fn withdraw(&mut self, asset: &Asset, basis_points: u64, tx: &ExternalTx) -> Result<()> {
        let base = self.config.base_asset.clone();
        if tx.chain != base.chain {
            return Err(TidepoolError::memo(format!(
                "withdraw must be sent from the {} chain",
                base.chain
            )));
        }
        self.absorb(&tx.coins)?;

        let out = self
            .state
            .pools
            .unstake(asset, &tx.from_address, basis_points, self.height)?;
        self.emit(
            EventStatus::Success,
            EventKind::Unstake {
                pool: asset.clone(),
                staker: tx.from_address.clone(),
                basis_points,
                rune_amount: out.rune,
                asset_amount: out.asset,
                units: out.units_removed,
            },
        );

        if !out.rune.is_zero() {
            self.pay(&tx.from_address, Coin::new(base.clone(), out.rune))?;
        }
        if !out.asset.is_zero() {
            let to = match out.asset_address {
                Some(address) => address,
                None if asset.chain == base.chain => tx.from_address.clone(),
                None => {
                    return Err(TidepoolError::InvalidAddress(format!(
                        "no {} address recorded for {}",
                        asset.chain, tx.from_address
                    )));
                }
            };
            self.pay(&to, Coin::new(asset.clone(), out.asset))?;
        }
        Ok(())
    }

    fn swap(
        &mut self,
        target: &Asset,
        destination: Option<&Address>,
        trade_target: Decimal,
        tx: &ExternalTx,
    ) -> Result<()> {
        let input = match tx.coins.len() {
            1 => tx.coins.first(),
            _ => None,
        }
        .ok_or_else(|| TidepoolError::memo("swap takes exactly one coin"))?;
        let destination = match destination {
            Some(address) => address.clone(),
            None if target.chain == tx.chain => tx.from_address.clone(),
            None => {
                return Err(TidepoolError::memo(format!(
                    "swap to {} needs a destination address",
                    target.chain
                )));
            }
        };

        let out = self.state.pools.swap(&input, target, trade_target)?;
        for leg in out.legs {
            self.emit(
                EventStatus::Success,
                EventKind::Swap {
                    pool: leg.pool,
                    input: leg.input,
                    output: leg.output,
                    trade_target,
                    liquidity_fee: leg.liquidity_fee,
                    trade_slip: leg.trade_slip,
                },
            );
        }
        self.pay(&destination, out.output)
    }

    fn admin(&mut self, admin: &AdminMemo, tx: &ExternalTx) -> Result<()> {
        if !self.config.is_admin(&tx.from_address) {
            return Err(TidepoolError::AdminNotAuthorized(tx.from_address.clone()));
        }
        self.absorb(&tx.coins)?;
        match admin.kind {
            AdminKind::Key => {
                tracing::info!(key = %admin.key, value = %admin.value, "admin config set");
                self.state
                    .admin_config
                    .insert(admin.key.clone(), admin.value.clone());
                self.emit(
                    EventStatus::Success,
                    EventKind::AdminConfig {
                        key: admin.key.clone(),
                        value: admin.value.clone(),
                    },
                );
            }
            AdminKind::PoolStatus => {
                let (pool, status) = admin.pool_status()?;
                self.state.pools.set_status(&pool, status)?;
                self.emit(EventStatus::Success, EventKind::Pool { pool, status });
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    /// Base-asset and pool-asset amounts of a deposit into `asset`'s pool.
    /// Any other coin makes the deposit invalid.
    fn pool_sides(&self, asset: &Asset, coins: &Coins) -> Result<(Decimal, Decimal)> {
        let base = &self.config.base_asset;
        if let Some(stray) = coins.iter().find(|c| c.asset != *base && c.asset != *asset) {
            return Err(TidepoolError::memo(format!(
                "{} cannot be deposited into the {asset} pool",
                stray.asset
            )));
        }
        Ok((coins.amount_of(base), coins.amount_of(asset)))
    }

    /// Keep coins that accompany an instruction without funding it: the
    /// base asset goes to the reserve, other assets are donated to their
    /// pool when it has stakers and otherwise stay in custody.
    fn absorb(&mut self, coins: &Coins) -> Result<()> {
        for coin in coins.iter() {
            if self.config.is_base_asset(&coin.asset) {
                self.state.reserve += coin.amount;
            } else if self
                .state
                .pools
                .pool(&coin.asset)
                .is_some_and(|p| !p.pool_units.is_zero())
            {
                self.state
                    .pools
                    .add_liquidity(&coin.asset, Decimal::ZERO, coin.amount)?;
            } else {
                tracing::debug!(%coin, "unattributed coin left in custody");
            }
        }
        Ok(())
    }
}

/// `TP_ERR_xxx` code of an error.
fn error_code(err: &TidepoolError) -> String {
    let text = err.to_string();
    text.split(':').next().unwrap_or_default().to_string()
}
