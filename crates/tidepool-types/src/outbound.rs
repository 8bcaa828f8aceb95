//! Outbound payment instructions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Address, Asset, Chain, Coin, Coins, PubKey, TxId};

/// Identity of a staged payment: at most one item per origin fact,
/// destination and asset is ever staged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OutboundKey {
    pub in_hash: TxId,
    pub to_address: Address,
    pub asset: Asset,
}

/// A payment waiting for the external signer to sign and broadcast it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundItem {
    /// Destination chain.
    pub chain: Chain,
    /// Originating inbound transaction, for correlation and idempotence.
    pub in_hash: TxId,
    pub to_address: Address,
    /// Vault expected to pay. Assigned at staging time when left empty.
    pub vault_pubkey: Option<PubKey>,
    pub coin: Coin,
    /// Memo the outbound transaction must carry (`OUTBOUND:` / `REFUND:`).
    pub memo: String,
    /// Network fee budgeted for the payment, set from the chain's gas
    /// estimate when staged. The paying vault keeps it in reserve.
    pub max_gas: Option<Coin>,
}

impl OutboundItem {
    /// An outbound payment for `coin` settling `in_hash`.
    #[must_use]
    pub fn new(in_hash: TxId, to_address: Address, coin: Coin) -> Self {
        Self {
            chain: coin.asset.chain.clone(),
            memo: format!("OUTBOUND:{in_hash}"),
            in_hash,
            to_address,
            vault_pubkey: None,
            coin,
            max_gas: None,
        }
    }

    /// A refund of `coin` for the failed inbound `in_hash`.
    #[must_use]
    pub fn refund(in_hash: TxId, to_address: Address, coin: Coin) -> Self {
        let mut item = Self::new(in_hash, to_address, coin);
        item.memo = format!("REFUND:{}", item.in_hash);
        item
    }

    /// What the paying vault must hold for this item: the coin plus its
    /// gas budget.
    #[must_use]
    pub fn spend(&self) -> Coins {
        let mut spend = Coins::new();
        spend.add(&self.coin);
        if let Some(gas) = &self.max_gas {
            spend.add(gas);
        }
        spend
    }

    #[must_use]
    pub fn key(&self) -> OutboundKey {
        OutboundKey {
            in_hash: self.in_hash.clone(),
            to_address: self.to_address.clone(),
            asset: self.coin.asset.clone(),
        }
    }
}

impl fmt::Display for OutboundItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.coin, self.to_address, self.memo)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn memo_and_chain_follow_origin() {
        let in_hash = TxId::random();
        let item = OutboundItem::new(
            in_hash.clone(),
            Address::random(),
            Coin::new(Asset::bnb(), Decimal::ONE),
        );
        assert_eq!(item.chain, Chain::bnb());
        assert_eq!(item.memo, format!("OUTBOUND:{in_hash}"));

        let refund = OutboundItem::refund(in_hash.clone(), Address::random(), Coin::new(Asset::bnb(), Decimal::ONE));
        assert_eq!(refund.memo, format!("REFUND:{in_hash}"));
    }

    #[test]
    fn key_separates_assets() {
        let in_hash = TxId::random();
        let to = Address::random();
        let rune: Asset = "BNB.RUNE-A1F".parse().unwrap();
        let a = OutboundItem::new(in_hash.clone(), to.clone(), Coin::new(Asset::bnb(), Decimal::ONE));
        let b = OutboundItem::new(in_hash, to, Coin::new(rune, Decimal::ONE));
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn spend_includes_gas_budget() {
        let mut item = OutboundItem::new(TxId::random(), Address::random(), Coin::new(Asset::bnb(), Decimal::from(40)));
        assert_eq!(item.spend().amount_of(&Asset::bnb()), Decimal::from(40));
        item.max_gas = Some(Coin::new(Asset::bnb(), Decimal::from(3)));
        assert_eq!(item.spend().amount_of(&Asset::bnb()), Decimal::from(43));
    }
}
