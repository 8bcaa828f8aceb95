//! Outbound completions: a vault was seen paying out.
//!
//! The vault is debited for everything that left it. Each coin is matched
//! against the outstanding item for its origin, destination and asset.
//! Whatever was not owed, or was owed but already paid, is recorded as
//! a theft for the settler to slash.

use rust_decimal::Decimal;
use tidepool_types::{
    Chain, Coin, EventKind, EventStatus, Memo, Observation, OutboundKey, Result, TxId,
};

use crate::{OutboundGuard, ledger::Theft, ledger::Txn};

impl Txn<'_> {
    /// Settle a finalized outbound observation.
    ///
    /// # Errors
    /// `VaultNotFound` or `InsufficientFunds` if the vault cannot account
    /// for the coins and gas that left it. Nothing is applied in that case.
    pub fn complete_outbound(&mut self, obs: &Observation, guard: &OutboundGuard) -> Result<()> {
        let tx = &obs.tx;
        let vault = &obs.observed_pubkey;

        let mut spent = tx.coins.clone();
        spent.add_all(&tx.gas);
        self.state.vaults.debit_all(vault, &spent)?;

        let origin = origin_of(&tx.memo);

        for coin in tx.coins.iter() {
            let owed = origin
                .as_ref()
                .map(|in_hash| OutboundKey {
                    in_hash: in_hash.clone(),
                    to_address: tx.to_address.clone(),
                    asset: coin.asset.clone(),
                })
                .filter(|key| !guard.is_settled(key))
                .and_then(|key| self.state.outbound.complete(&key).map(|item| (key, item)));

            let excess = match owed {
                Some((key, item)) => {
                    if item.vault_pubkey.as_ref() != Some(vault) {
                        tracing::warn!(in_hash = %key.in_hash, paid_by = %vault.short(), "outbound paid by another vault than assigned");
                    }
                    self.changes.settled.push(key);
                    (coin.amount - item.coin.amount).max(Decimal::ZERO)
                }
                None => coin.amount,
            };
            if excess > Decimal::ZERO {
                let stolen = Coin::new(coin.asset.clone(), excess);
                let value = self.state.pools.value_in_rune(&stolen.asset, excess);
                tracing::error!(vault = %vault.short(), %stolen, %value, tx = %tx.id, "unauthorized outbound");
                self.changes.thefts.push(Theft {
                    vault: vault.clone(),
                    stolen,
                    value,
                });
            }
        }

        for gas in tx.gas.iter() {
            self.reimburse_gas(&tx.chain, &gas);
        }

        self.emit(
            EventStatus::Success,
            EventKind::Outbound {
                in_hash: origin.unwrap_or_else(|| tx.id.clone()),
                coins: tx.coins.clone(),
            },
        );
        Ok(())
    }

    /// Fold the fee into the chain's estimate and compensate the gas
    /// asset's pool from the reserve.
    fn reimburse_gas(&mut self, chain: &Chain, gas: &Coin) {
        self.state.gas.observe(chain, gas);

        let value = self.state.pools.value_in_rune(&gas.asset, gas.amount);
        let reimbursed = value.min(self.state.reserve);
        if !self.config.is_base_asset(&gas.asset) {
            self.state.pools.pay_gas(&gas.asset, gas.amount, reimbursed);
        }
        self.state.reserve -= reimbursed;
        self.emit(
            EventStatus::Success,
            EventKind::Gas {
                chain: chain.clone(),
                gas: gas.clone(),
                rune_reimbursed: reimbursed,
            },
        );
    }
}

/// Origin of an outbound memo, if it names one.
fn origin_of(memo: &str) -> Option<TxId> {
    match Memo::parse(memo) {
        Ok(Memo::Outbound { tx_id } | Memo::Refund { tx_id }) => Some(tx_id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use tidepool_types::*;

    use super::*;
    use crate::LedgerState;

    fn rune() -> Asset {
        "BNB.RUNE-A1F".parse().unwrap()
    }

    struct Fixture {
        config: SettlementConfig,
        state: LedgerState,
        vault: PubKey,
        item: OutboundItem,
    }

    /// A vault holding 1000 RUNE with one 100 RUNE payment in flight.
    fn fixture() -> Fixture {
        let config = SettlementConfig {
            transaction_fee: Decimal::ZERO,
            ..SettlementConfig::default()
        };
        let mut state = LedgerState::new(&config);
        let vault = PubKey::random();
        state.vaults.set_vault(Vault::new(1, VaultStatus::Active, VaultType::Pooled, vault.clone()));
        state.vaults.credit(&vault, &Coin::new(rune(), Decimal::from(1_000))).unwrap();
        let mut item = OutboundItem::new(TxId::random(), Address::random(), Coin::new(rune(), Decimal::from(100)));
        item.vault_pubkey = Some(vault.clone());
        state.outbound.stage(1, item.clone()).unwrap();
        state.outbound.claim_batch(1);
        Fixture {
            config,
            state,
            vault,
            item,
        }
    }

    fn payout(f: &Fixture, amount: i64, memo: &str) -> Observation {
        let coins: Coins = vec![Coin::new(rune(), Decimal::from(amount))].into_iter().collect();
        let mut tx = ExternalTx::dummy(coins, memo);
        tx.to_address = f.item.to_address.clone();
        Observation::new(tx, 2, f.vault.clone(), Direction::Outbound)
    }

    #[test]
    fn matching_payment_settles() {
        let f = fixture();
        let guard = OutboundGuard::new(10);
        let obs = payout(&f, 100, &f.item.memo);
        let mut txn = Txn::new(f.state.clone(), &f.config, 2, obs.tx.id.clone());
        txn.complete_outbound(&obs, &guard).unwrap();

        assert_eq!(txn.state.vaults.balance(&f.vault, &rune()), Decimal::from(900));
        assert_eq!(txn.changes.settled, vec![f.item.key()]);
        assert!(txn.changes.thefts.is_empty());
        assert_eq!(txn.state.outbound.in_flight_len(), 0);
    }

    #[test]
    fn overpayment_is_theft_of_the_excess() {
        let f = fixture();
        let guard = OutboundGuard::new(10);
        let obs = payout(&f, 130, &f.item.memo);
        let mut txn = Txn::new(f.state.clone(), &f.config, 2, obs.tx.id.clone());
        txn.complete_outbound(&obs, &guard).unwrap();
        assert_eq!(txn.changes.thefts.len(), 1);
        assert_eq!(txn.changes.thefts[0].stolen.amount, Decimal::from(30));
        assert_eq!(txn.changes.thefts[0].value, Decimal::from(30));
    }

    #[test]
    fn already_settled_payment_is_theft() {
        let f = fixture();
        let mut guard = OutboundGuard::new(10);
        guard.mark_settled(f.item.key()).unwrap();
        let obs = payout(&f, 100, &f.item.memo);
        let mut txn = Txn::new(f.state.clone(), &f.config, 2, obs.tx.id.clone());
        txn.complete_outbound(&obs, &guard).unwrap();
        assert!(txn.changes.settled.is_empty());
        assert_eq!(txn.changes.thefts[0].stolen.amount, Decimal::from(100));
    }

    #[test]
    fn payment_beyond_balance_is_rejected() {
        let f = fixture();
        let guard = OutboundGuard::new(10);
        let obs = payout(&f, 5_000, &f.item.memo);
        let mut txn = Txn::new(f.state.clone(), &f.config, 2, obs.tx.id.clone());
        let err = txn.complete_outbound(&obs, &guard).unwrap_err();
        assert!(matches!(err, TidepoolError::InsufficientFunds { .. }));
    }

    #[test]
    fn gas_is_tracked_and_reimbursed_from_reserve() {
        let mut f = fixture();
        f.state.reserve = Decimal::from(3);
        let guard = OutboundGuard::new(10);
        let mut obs = payout(&f, 100, &f.item.memo);
        obs.tx.gas = vec![Coin::new(rune(), Decimal::from(5))].into_iter().collect();
        let mut txn = Txn::new(f.state.clone(), &f.config, 2, obs.tx.id.clone());
        txn.complete_outbound(&obs, &guard).unwrap();

        assert_eq!(txn.state.vaults.balance(&f.vault, &rune()), Decimal::from(895));
        assert!(txn.state.reserve.is_zero());
        assert_eq!(txn.state.gas.get(&Chain::bnb()).unwrap().amount, Decimal::from(5));
        let kinds: Vec<_> = txn.changes.events.iter().map(|(_, k)| k.type_name()).collect();
        assert_eq!(kinds, vec!["gas", "outbound"]);
    }
}
