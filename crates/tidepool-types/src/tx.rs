//! External-chain transactions and signer observations of them.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Address, Chain, Coins, PubKey, Result, TidepoolError, TxId};

/// Immutable record of a transaction on an external chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalTx {
    pub id: TxId,
    pub chain: Chain,
    pub from_address: Address,
    pub to_address: Address,
    /// Coins transferred.
    pub coins: Coins,
    /// Coins paid to the network as gas.
    pub gas: Coins,
    pub memo: String,
}

impl ExternalTx {
    /// Basic well-formedness: the sender, coins and memo must be present.
    pub fn validate(&self) -> Result<()> {
        if self.from_address.as_str().is_empty() {
            return Err(TidepoolError::InvalidObservation {
                reason: "sender cannot be empty".to_string(),
            });
        }
        if self.coins.is_empty() {
            return Err(TidepoolError::InvalidObservation {
                reason: "coins cannot be empty".to_string(),
            });
        }
        if self.memo.trim().is_empty() {
            return Err(TidepoolError::InvalidObservation {
                reason: "memo cannot be empty".to_string(),
            });
        }
        if self.coins.iter().any(|c| c.amount.is_sign_negative()) {
            return Err(TidepoolError::InvalidObservation {
                reason: "coin amounts must be non-negative".to_string(),
            });
        }
        Ok(())
    }
}

/// Equal iff ID, chain, addresses, coins and memo all match. Gas is not
/// part of identity; memos compare case-insensitively.
impl PartialEq for ExternalTx {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.chain == other.chain
            && self.from_address == other.from_address
            && self.to_address == other.to_address
            && self.coins == other.coins
            && self.memo.eq_ignore_ascii_case(&other.memo)
    }
}

impl Eq for ExternalTx {}

impl fmt::Display for ExternalTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ==> {} (Memo: {}) {}",
            self.id, self.from_address, self.to_address, self.memo, self.coins
        )
    }
}

/// Whether an observed transaction enters or leaves custody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Funds arriving at a vault.
    Inbound,
    /// Funds leaving a vault.
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => write!(f, "INBOUND"),
            Self::Outbound => write!(f, "OUTBOUND"),
        }
    }
}

/// One signer's report that an [`ExternalTx`] happened.
///
/// Block height is reported but is not part of the content that signers
/// must agree on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub tx: ExternalTx,
    /// External block height at which the transaction was seen.
    pub block_height: u64,
    /// Custody key the transaction was seen arriving at / leaving from.
    pub observed_pubkey: PubKey,
    pub direction: Direction,
}

impl Observation {
    #[must_use]
    pub fn new(tx: ExternalTx, block_height: u64, observed_pubkey: PubKey, direction: Direction) -> Self {
        Self {
            tx,
            block_height,
            observed_pubkey,
            direction,
        }
    }

    /// Content digest identifying this observation's variant.
    ///
    /// `SHA-256(domain_sep || id || chain || from || to || coins || memo || pubkey || direction)`
    /// with the memo lowercased and amounts normalized, so two observations
    /// digest equally iff they are `==`.
    #[must_use]
    pub fn variant_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"tidepool:observation:v1:");
        hasher.update(self.tx.id.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.tx.chain.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.tx.from_address.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.tx.to_address.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update((self.tx.coins.len() as u64).to_le_bytes());
        for coin in self.tx.coins.iter() {
            hasher.update(coin.asset.to_string().as_bytes());
            hasher.update([0u8]);
            hasher.update(coin.amount.normalize().to_string().as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(self.tx.memo.to_ascii_lowercase().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.observed_pubkey.as_bytes());
        hasher.update([match self.direction {
            Direction::Inbound => 0u8,
            Direction::Outbound => 1u8,
        }]);
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        digest
    }
}

impl PartialEq for Observation {
    fn eq(&self, other: &Self) -> bool {
        self.tx == other.tx
            && self.observed_pubkey == other.observed_pubkey
            && self.direction == other.direction
    }
}

impl Eq for Observation {}

#[cfg(any(test, feature = "test-helpers"))]
impl ExternalTx {
    /// A random, well-formed transaction paying `coins` with `memo`.
    pub fn dummy(coins: Coins, memo: &str) -> Self {
        Self {
            id: TxId::random(),
            chain: Chain::bnb(),
            from_address: Address::random(),
            to_address: Address::random(),
            coins,
            gas: Coins::new(),
            memo: memo.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::{Asset, Coin};

    fn coins(n: i64) -> Coins {
        vec![Coin::new(Asset::bnb(), Decimal::new(n, 0))]
            .into_iter()
            .collect()
    }

    #[test]
    fn validate_rejects_empty_coins_and_memo() {
        let tx = ExternalTx::dummy(coins(10), "SWAP:BNB.BNB");
        assert!(tx.validate().is_ok());

        let no_coins = ExternalTx::dummy(Coins::new(), "SWAP:BNB.BNB");
        assert!(no_coins.validate().is_err());

        let no_memo = ExternalTx::dummy(coins(10), "   ");
        assert!(no_memo.validate().is_err());
    }

    #[test]
    fn equality_ignores_gas_and_memo_case() {
        let a = ExternalTx::dummy(coins(10), "swap:bnb.bnb");
        let mut b = a.clone();
        b.memo = "SWAP:BNB.BNB".to_string();
        b.gas = coins(1);
        assert_eq!(a, b);

        b.coins = coins(11);
        assert_ne!(a, b);
    }

    #[test]
    fn variant_digest_tracks_equality() {
        let pk = PubKey::random();
        let tx = ExternalTx::dummy(coins(10), "STAKE:BNB.BNB");
        let a = Observation::new(tx.clone(), 12, pk.clone(), Direction::Inbound);
        let mut b = Observation::new(tx.clone(), 99, pk.clone(), Direction::Inbound);
        b.tx.memo = "stake:bnb.bnb".to_string();
        assert_eq!(a, b);
        assert_eq!(a.variant_digest(), b.variant_digest());

        let mut evil = a.clone();
        evil.tx.coins = coins(1_000);
        assert_ne!(a, evil);
        assert_ne!(a.variant_digest(), evil.variant_digest());

        let out = Observation::new(tx, 12, pk, Direction::Outbound);
        assert_ne!(a.variant_digest(), out.variant_digest());
    }

    #[test]
    fn digest_normalizes_amount_scale() {
        let pk = PubKey::random();
        let tx = ExternalTx::dummy(coins(10), "STAKE:BNB.BNB");
        let mut scaled = tx.clone();
        scaled.coins = vec![Coin::new(Asset::bnb(), Decimal::new(1000, 2))]
            .into_iter()
            .collect();
        let a = Observation::new(tx, 1, pk.clone(), Direction::Inbound);
        let b = Observation::new(scaled, 1, pk, Direction::Inbound);
        assert_eq!(a, b);
        assert_eq!(a.variant_digest(), b.variant_digest());
    }
}
