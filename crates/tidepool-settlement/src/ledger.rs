//! Ledger state and the working copy one instruction runs against.
//!
//! Every finalized fact is applied to a clone of [`LedgerState`]. The clone
//! replaces the live state only when the whole instruction succeeds, so a
//! failure halfway through leaves no partial update behind. Effects that
//! leave the state (events, settled outbound keys, bond slashes) are
//! collected in [`Changes`] and applied by the settler on commit.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tidepool_amm::PoolBook;
use tidepool_types::{
    Address, Amount, Asset, Chain, Coin, Coins, EventKind, EventStatus, OutboundItem, OutboundKey,
    PubKey, Result, SettlementConfig, TidepoolError, TxId, VaultType,
};

use crate::{GasTracker, OutboundQueue, VaultLedger};

/// Everything one instruction may change.
#[derive(Debug, Clone)]
pub struct LedgerState {
    pub vaults: VaultLedger,
    pub pools: PoolBook,
    pub outbound: OutboundQueue,
    pub gas: GasTracker,
    /// Protocol-owned base asset collected from fees and slashes.
    pub reserve: Amount,
    /// Key/value settings written by ADMIN instructions.
    pub admin_config: BTreeMap<String, String>,
}

impl LedgerState {
    #[must_use]
    pub fn new(config: &SettlementConfig) -> Self {
        Self {
            vaults: VaultLedger::new(),
            pools: PoolBook::new(config.base_asset.clone(), config.default_pool_status),
            outbound: OutboundQueue::new(),
            gas: GasTracker::new(config.gas_smoothing_weight),
            reserve: Decimal::ZERO,
            admin_config: BTreeMap::new(),
        }
    }

    /// Balance of `asset` in `vault` not yet promised to a staged or
    /// in-flight outbound.
    #[must_use]
    pub fn available(&self, vault: &PubKey, asset: &Asset) -> Amount {
        self.vaults.balance(vault, asset) - self.outbound.committed(vault, asset)
    }

    /// First coin of `spend` that `vault` cannot cover, with what it has
    /// available of that asset.
    fn shortfall(&self, vault: &PubKey, spend: &Coins) -> Option<(Coin, Amount)> {
        spend.iter().find_map(|need| {
            let available = self.available(vault, &need.asset);
            (available < need.amount).then_some((need, available))
        })
    }

    /// Move a retiring vault's coins into an active one.
    ///
    /// # Errors
    /// `SettlementFailed` while outbound items are still assigned to
    /// `from`; `VaultNotFound` or `SettlementFailed` if the vaults are not
    /// a retiring source and an active target.
    pub fn migrate_vault(&mut self, from: &PubKey, to: &PubKey) -> Result<Coins> {
        let owed = self.outbound.assigned_to(from);
        if owed > 0 {
            return Err(TidepoolError::SettlementFailed {
                reason: format!("vault {} still has {owed} outbound items to pay", from.short()),
            });
        }
        self.vaults.migrate(from, to)
    }
}

/// A custody loss detected while settling an outbound completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theft {
    pub vault: PubKey,
    pub stolen: Coin,
    /// Base-asset value of `stolen` when it was detected.
    pub value: Amount,
}

/// Side effects of one instruction, applied on commit.
#[derive(Debug, Default)]
pub struct Changes {
    pub events: Vec<(EventStatus, EventKind)>,
    pub settled: Vec<OutboundKey>,
    pub thefts: Vec<Theft>,
}

/// Working copy of the ledger for one finalized fact.
pub struct Txn<'a> {
    pub state: LedgerState,
    pub changes: Changes,
    pub config: &'a SettlementConfig,
    pub height: u64,
    pub in_hash: TxId,
}

impl<'a> Txn<'a> {
    #[must_use]
    pub fn new(state: LedgerState, config: &'a SettlementConfig, height: u64, in_hash: TxId) -> Self {
        Self {
            state,
            changes: Changes::default(),
            config,
            height,
            in_hash,
        }
    }

    pub fn into_parts(self) -> (LedgerState, Changes) {
        (self.state, self.changes)
    }

    pub fn emit(&mut self, status: EventStatus, kind: EventKind) {
        self.changes.events.push((status, kind));
    }

    // -----------------------------------------------------------------
    // Fees and payouts
    // -----------------------------------------------------------------

    /// Take the transaction fee out of an outbound coin.
    ///
    /// The fee is fixed in base-asset units. For other assets it is
    /// converted at the pool price, the fee portion is handed back to the
    /// pool and the pool's base-asset equivalent moves to the reserve.
    /// Returns `None` when the fee consumes the whole coin.
    pub fn deduct_fee(&mut self, coin: Coin) -> Result<Option<Coin>> {
        let fee = self.config.transaction_fee;
        if fee.is_zero() {
            return Ok(Some(coin));
        }

        let taken = if self.config.is_base_asset(&coin.asset) {
            let taken = fee.min(coin.amount);
            self.state.reserve += taken;
            taken
        } else {
            let fee_asset = self.state.pools.rune_in_asset(&coin.asset, fee);
            if fee_asset.is_zero() {
                return Ok(Some(coin));
            }
            let taken = fee_asset.min(coin.amount);
            self.state.reserve += self.state.pools.collect_fee(&coin.asset, taken)?;
            taken
        };

        let remaining = coin.amount - taken;
        if remaining.is_zero() {
            tracing::debug!(%coin, "outbound consumed by fee");
            return Ok(None);
        }
        Ok(Some(Coin::new(coin.asset, remaining)))
    }

    /// Deduct the fee from `coin` and stage what is left for `to`.
    pub fn pay(&mut self, to: &Address, coin: Coin) -> Result<()> {
        let Some(coin) = self.deduct_fee(coin)? else {
            return Ok(());
        };
        self.stage(OutboundItem::new(self.in_hash.clone(), to.clone(), coin))
    }

    /// Deduct the fee from `coin` and stage a refund to `to` paid by `vault`.
    pub fn refund(&mut self, to: &Address, coin: Coin, vault: &PubKey) -> Result<()> {
        let Some(coin) = self.deduct_fee(coin)? else {
            return Ok(());
        };
        let mut item = OutboundItem::refund(self.in_hash.clone(), to.clone(), coin);
        item.vault_pubkey = Some(vault.clone());
        self.stage(item)
    }

    /// Stage `item` at the current height with a gas budget from the
    /// chain's estimate, assigning a paying vault if the item does not
    /// name one.
    ///
    /// # Errors
    /// - `InsufficientFunds` if the named vault cannot cover the coin and gas
    /// - `NoVaultCanPay` if no active vault can
    /// - `DuplicateOutbound` from the queue
    pub fn stage(&mut self, mut item: OutboundItem) -> Result<()> {
        item.max_gas = self.gas_budget(&item.chain);
        let spend = item.spend();
        let vault = match item.vault_pubkey.take() {
            Some(vault) => {
                if let Some((need, available)) = self.state.shortfall(&vault, &spend) {
                    return Err(TidepoolError::InsufficientFunds {
                        vault,
                        asset: need.asset,
                        needed: need.amount,
                        available,
                    });
                }
                vault
            }
            None => self.select_vault(&item.coin, &spend)?,
        };
        item.vault_pubkey = Some(vault);
        self.state.outbound.stage(self.height, item)
    }

    fn gas_budget(&self, chain: &Chain) -> Option<Coin> {
        self.state
            .gas
            .get(chain)
            .filter(|estimate| !estimate.amount.is_zero())
            .map(|estimate| Coin::new(estimate.asset.clone(), estimate.amount))
    }

    /// First active vault, dedicated before pooled, that can still cover
    /// `spend` after its outstanding commitments.
    fn select_vault(&self, coin: &Coin, spend: &Coins) -> Result<PubKey> {
        let vaults = &self.state.vaults;
        vaults
            .list_active(VaultType::Dedicated)
            .chain(vaults.list_active(VaultType::Pooled))
            .find(|v| self.state.shortfall(&v.pubkey, spend).is_none())
            .map(|v| v.pubkey.clone())
            .ok_or_else(|| TidepoolError::NoVaultCanPay {
                asset: coin.asset.clone(),
                amount: coin.amount,
            })
    }
}
