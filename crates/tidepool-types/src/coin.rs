//! Value types: assets, coins and coin multisets.
//!
//! Amounts are whole base units (10^8 per unit) carried as [`Decimal`] so
//! every intermediate in the pool arithmetic stays exact until the final
//! floor.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{constants, Chain, Result, TidepoolError};

/// Amount in base units.
pub type Amount = Decimal;

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// One fungible unit type on one chain, written `CHAIN.SYMBOL`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset {
    pub chain: Chain,
    pub symbol: String,
}

impl Asset {
    pub fn new(chain: Chain, symbol: &str) -> Result<Self> {
        let symbol = symbol.trim();
        if symbol.is_empty()
            || !symbol
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(TidepoolError::InvalidAsset(symbol.to_string()));
        }
        Ok(Self {
            chain,
            symbol: symbol.to_ascii_uppercase(),
        })
    }

    /// `BNB.BNB`, the gas asset of the default chain.
    #[must_use]
    pub fn bnb() -> Self {
        Self {
            chain: Chain::bnb(),
            symbol: "BNB".to_string(),
        }
    }

    /// The symbol without any issuer suffix (`RUNE-A1F` → `RUNE`).
    #[must_use]
    pub fn ticker(&self) -> &str {
        self.symbol.split('-').next().unwrap_or(&self.symbol)
    }
}

impl FromStr for Asset {
    type Err = TidepoolError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.split_once('.') {
            Some((chain, symbol)) => Self::new(Chain::new(chain)?, symbol),
            None => Self::new(Chain::new(constants::DEFAULT_CHAIN)?, s),
        }
        .map_err(|_| TidepoolError::InvalidAsset(s.to_string()))
    }
}

impl TryFrom<String> for Asset {
    type Error = TidepoolError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.to_string()
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.chain, self.symbol)
    }
}

// ---------------------------------------------------------------------------
// Coin
// ---------------------------------------------------------------------------

/// An amount of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub asset: Asset,
    pub amount: Amount,
}

impl Coin {
    #[must_use]
    pub fn new(asset: Asset, amount: Amount) -> Self {
        Self { asset, amount }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.asset)
    }
}

// ---------------------------------------------------------------------------
// Coins
// ---------------------------------------------------------------------------

/// Multiset of coins keyed by asset. Inserting an asset that is already
/// present merges the amounts; zero entries are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coins(BTreeMap<Asset, Amount>);

impl Coins {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Merge a coin into the set.
    pub fn add(&mut self, coin: &Coin) {
        if coin.amount.is_zero() {
            return;
        }
        *self.0.entry(coin.asset.clone()).or_insert(Decimal::ZERO) += coin.amount;
    }

    /// Merge every coin of `other` into the set.
    pub fn add_all(&mut self, other: &Coins) {
        for coin in other.iter() {
            self.add(&coin);
        }
    }

    /// Remove `coin.amount` of `coin.asset`.
    ///
    /// Returns the amount that was available if it is less than requested;
    /// the set is unchanged in that case.
    pub fn try_sub(&mut self, coin: &Coin) -> std::result::Result<(), Amount> {
        let available = self.amount_of(&coin.asset);
        if available < coin.amount {
            return Err(available);
        }
        let remaining = available - coin.amount;
        if remaining.is_zero() {
            self.0.remove(&coin.asset);
        } else {
            self.0.insert(coin.asset.clone(), remaining);
        }
        Ok(())
    }

    /// Held amount of an asset (zero if absent).
    #[must_use]
    pub fn amount_of(&self, asset: &Asset) -> Amount {
        self.0.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Coins in asset order.
    pub fn iter(&self) -> impl Iterator<Item = Coin> + '_ {
        self.0
            .iter()
            .map(|(asset, amount)| Coin::new(asset.clone(), *amount))
    }

    /// The first coin in asset order, if any.
    #[must_use]
    pub fn first(&self) -> Option<Coin> {
        self.iter().next()
    }
}

impl FromIterator<Coin> for Coins {
    fn from_iter<I: IntoIterator<Item = Coin>>(iter: I) -> Self {
        let mut coins = Self::new();
        for coin in iter {
            coins.add(&coin);
        }
        coins
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rune() -> Asset {
        "BNB.RUNE-A1F".parse().unwrap()
    }

    #[test]
    fn asset_parse_with_and_without_chain() {
        let a: Asset = "bnb.bnb".parse().unwrap();
        assert_eq!(a, Asset::bnb());
        let b: Asset = "RUNE-1BA".parse().unwrap();
        assert_eq!(b.chain, Chain::bnb());
        assert_eq!(b.symbol, "RUNE-1BA");
        assert_eq!(b.ticker(), "RUNE");
        assert_eq!(b.to_string(), "BNB.RUNE-1BA");
    }

    #[test]
    fn asset_parse_rejects_garbage() {
        assert!("".parse::<Asset>().is_err());
        assert!("BNB.".parse::<Asset>().is_err());
        assert!(".BNB".parse::<Asset>().is_err());
        assert!("BNB.B N B".parse::<Asset>().is_err());
    }

    #[test]
    fn coins_merge_on_insert() {
        let mut coins = Coins::new();
        coins.add(&Coin::new(Asset::bnb(), Decimal::new(10, 0)));
        coins.add(&Coin::new(Asset::bnb(), Decimal::new(5, 0)));
        coins.add(&Coin::new(rune(), Decimal::new(7, 0)));
        assert_eq!(coins.len(), 2);
        assert_eq!(coins.amount_of(&Asset::bnb()), Decimal::new(15, 0));
    }

    #[test]
    fn zero_coins_are_not_stored() {
        let coins: Coins = vec![Coin::new(Asset::bnb(), Decimal::ZERO)].into_iter().collect();
        assert!(coins.is_empty());
    }

    #[test]
    fn try_sub_never_goes_negative() {
        let mut coins: Coins = vec![Coin::new(Asset::bnb(), Decimal::new(10, 0))]
            .into_iter()
            .collect();
        let err = coins
            .try_sub(&Coin::new(Asset::bnb(), Decimal::new(11, 0)))
            .unwrap_err();
        assert_eq!(err, Decimal::new(10, 0));
        assert_eq!(coins.amount_of(&Asset::bnb()), Decimal::new(10, 0));

        coins
            .try_sub(&Coin::new(Asset::bnb(), Decimal::new(10, 0)))
            .unwrap();
        assert!(coins.is_empty());
    }

    #[test]
    fn coins_serde_roundtrip() {
        let coins: Coins = vec![
            Coin::new(Asset::bnb(), Decimal::new(12345, 0)),
            Coin::new(rune(), Decimal::new(678, 0)),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&coins).unwrap();
        let back: Coins = serde_json::from_str(&json).unwrap();
        assert_eq!(coins, back);
    }
}
