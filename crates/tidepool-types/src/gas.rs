//! Per-chain network fee estimate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Amount, Asset, Chain};

/// Running estimate of the typical network fee on one chain.
///
/// Updated, never replaced: each observed fee moves the estimate by
/// `(observed - current) / weight`, so one outlier cannot swing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasEstimate {
    pub chain: Chain,
    /// Asset the chain's fees are paid in.
    pub asset: Asset,
    pub amount: Amount,
    /// Number of observations folded in so far.
    pub samples: u64,
}

impl GasEstimate {
    #[must_use]
    pub fn new(chain: Chain, asset: Asset) -> Self {
        Self {
            chain,
            asset,
            amount: Decimal::ZERO,
            samples: 0,
        }
    }

    /// Fold in one observed fee. The first sample sets the estimate.
    ///
    /// A zero weight is treated as one (replace).
    pub fn observe(&mut self, observed: Amount, weight: u64) {
        if self.samples == 0 {
            self.amount = observed;
        } else {
            let weight = Decimal::from(weight.max(1));
            let delta = (observed - self.amount) / weight;
            self.amount = (self.amount + delta).trunc();
        }
        self.samples = self.samples.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate() -> GasEstimate {
        GasEstimate::new(Chain::bnb(), Asset::bnb())
    }

    #[test]
    fn first_sample_sets_value() {
        let mut gas = estimate();
        gas.observe(Decimal::from(37_500), 4);
        assert_eq!(gas.amount, Decimal::from(37_500));
        assert_eq!(gas.samples, 1);
    }

    #[test]
    fn outlier_moves_estimate_by_a_fraction() {
        let mut gas = estimate();
        gas.observe(Decimal::from(1_000), 4);
        gas.observe(Decimal::from(5_000), 4);
        assert_eq!(gas.amount, Decimal::from(2_000));
        gas.observe(Decimal::from(0), 4);
        assert_eq!(gas.amount, Decimal::from(1_500));
    }

    #[test]
    fn weight_one_replaces() {
        let mut gas = estimate();
        gas.observe(Decimal::from(10), 1);
        gas.observe(Decimal::from(99), 0);
        assert_eq!(gas.amount, Decimal::from(99));
    }
}
