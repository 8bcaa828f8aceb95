//! Per-chain gas estimates, smoothed from observed outbound fees.

use std::collections::BTreeMap;

use tidepool_types::{Chain, Coin, GasEstimate};

#[derive(Debug, Clone)]
pub struct GasTracker {
    estimates: BTreeMap<Chain, GasEstimate>,
    weight: u64,
}

impl GasTracker {
    #[must_use]
    pub fn new(weight: u64) -> Self {
        Self {
            estimates: BTreeMap::new(),
            weight,
        }
    }

    /// Fold one observed fee on `chain` into its estimate.
    pub fn observe(&mut self, chain: &Chain, gas: &Coin) -> &GasEstimate {
        let weight = self.weight;
        let estimate = self
            .estimates
            .entry(chain.clone())
            .or_insert_with(|| GasEstimate::new(chain.clone(), gas.asset.clone()));
        estimate.observe(gas.amount, weight);
        tracing::debug!(%chain, estimate = %estimate.amount, samples = estimate.samples, "gas estimate updated");
        estimate
    }

    #[must_use]
    pub fn get(&self, chain: &Chain) -> Option<&GasEstimate> {
        self.estimates.get(chain)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use tidepool_types::Asset;

    use super::*;

    #[test]
    fn chains_are_tracked_separately() {
        let mut gas = GasTracker::new(2);
        let bnb = Coin::new(Asset::bnb(), Decimal::from(100));
        gas.observe(&Chain::bnb(), &bnb);
        gas.observe(&Chain::bnb(), &Coin::new(Asset::bnb(), Decimal::from(300)));
        assert_eq!(gas.get(&Chain::bnb()).unwrap().amount, Decimal::from(200));
        assert!(gas.get(&Chain::btc()).is_none());
    }
}
