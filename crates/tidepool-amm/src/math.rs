//! Continuous liquidity pool formulas.
//!
//! All inputs and outputs are whole base units. Intermediates stay exact
//! while they fit in a [`Decimal`]; when a product would overflow, the
//! formula is evaluated in ratio form instead. Results are floored.

use rust_decimal::Decimal;
use tidepool_types::{constants, Amount, Result, TidepoolError};

/// `prod(numerators) / prod(denominators)`, exact while the products fit,
/// otherwise evaluated as an alternating product of ratios.
fn scaled(numerators: &[Decimal], denominators: &[Decimal], op: &'static str) -> Result<Decimal> {
    if denominators.iter().any(Decimal::is_zero) {
        return Err(TidepoolError::math(format!("{op}: division by zero")));
    }
    let exact = || -> Option<Decimal> {
        let n = numerators.iter().try_fold(Decimal::ONE, |acc, v| acc.checked_mul(*v))?;
        let d = denominators.iter().try_fold(Decimal::ONE, |acc, v| acc.checked_mul(*v))?;
        n.checked_div(d)
    };
    let ratio = || -> Option<Decimal> {
        let mut acc = Decimal::ONE;
        for (i, n) in numerators.iter().enumerate() {
            acc = acc.checked_mul(*n)?;
            if let Some(d) = denominators.get(i) {
                acc = acc.checked_div(*d)?;
            }
        }
        for d in denominators.iter().skip(numerators.len()) {
            acc = acc.checked_div(*d)?;
        }
        Some(acc)
    };
    exact().or_else(ratio).ok_or(TidepoolError::MathOverflow { op })
}

fn add(a: Decimal, b: Decimal, op: &'static str) -> Result<Decimal> {
    a.checked_add(b).ok_or(TidepoolError::MathOverflow { op })
}

fn require_non_negative(values: &[(Decimal, &str)]) -> Result<()> {
    for (value, name) in values {
        if value.is_sign_negative() {
            return Err(TidepoolError::math(format!("{name} cannot be negative")));
        }
    }
    Ok(())
}

/// Liquidity units issued for depositing `stake_rune` and `stake_asset`
/// into a pool holding `pool_rune` and `pool_asset`.
///
/// ```text
/// R' = R + r,  A' = A + a
/// units = (R' + A') * (r*A' + R'*a) / (4 * R' * A')
/// ```
///
/// # Errors
/// `MathPrecondition` if either after-deposit balance is zero or any input
/// is negative.
pub fn calculate_pool_units(
    pool_rune: Amount,
    pool_asset: Amount,
    stake_rune: Amount,
    stake_asset: Amount,
) -> Result<Amount> {
    require_non_negative(&[
        (pool_rune, "pool rune"),
        (pool_asset, "pool asset"),
        (stake_rune, "stake rune"),
        (stake_asset, "stake asset"),
    ])?;
    let rune_after = add(pool_rune, stake_rune, "pool units")?;
    let asset_after = add(pool_asset, stake_asset, "pool units")?;
    if rune_after.is_zero() {
        return Err(TidepoolError::math("total rune in the pool is zero"));
    }
    if asset_after.is_zero() {
        return Err(TidepoolError::math("total asset in the pool is zero"));
    }
    let total = add(rune_after, asset_after, "pool units")?;
    let four = Decimal::from(4);

    let exact = || -> Option<Decimal> {
        let weighted = stake_rune
            .checked_mul(asset_after)?
            .checked_add(rune_after.checked_mul(stake_asset)?)?;
        let denominator = four.checked_mul(rune_after)?.checked_mul(asset_after)?;
        total.checked_mul(weighted)?.checked_div(denominator)
    };
    // (r*A' + R'*a) / (R'*A') == r/R' + a/A'
    let ratio = || -> Option<Decimal> {
        let share = stake_rune
            .checked_div(rune_after)?
            .checked_add(stake_asset.checked_div(asset_after)?)?;
        total.checked_mul(share)?.checked_div(four)
    };

    exact()
        .or_else(ratio)
        .map(|units| units.floor())
        .ok_or(TidepoolError::MathOverflow { op: "pool units" })
}

/// Amounts released by an unstake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnstakeAmounts {
    pub rune: Amount,
    pub asset: Amount,
    /// Units burned from the staker and the pool.
    pub units_removed: Amount,
    /// Units the staker keeps.
    pub remaining_units: Amount,
}

/// Share of the pool released when a staker holding `staker_units` of
/// `pool_units` withdraws `basis_points` / 10000 of their position.
///
/// # Errors
/// - `InvalidBasisPoints` if `basis_points` is outside `(0, 10000]`
/// - `MathPrecondition` if pool units or balances are not positive, or the
///   staker holds nothing or more than the pool
pub fn calculate_unstake(
    pool_units: Amount,
    pool_rune: Amount,
    pool_asset: Amount,
    staker_units: Amount,
    basis_points: u64,
) -> Result<UnstakeAmounts> {
    if basis_points == 0 || basis_points > constants::MAX_WITHDRAW_BASIS_POINTS {
        return Err(TidepoolError::InvalidBasisPoints(basis_points));
    }
    if pool_units <= Decimal::ZERO {
        return Err(TidepoolError::math("pool units must be positive"));
    }
    if pool_rune <= Decimal::ZERO {
        return Err(TidepoolError::math("pool rune balance must be positive"));
    }
    if pool_asset <= Decimal::ZERO {
        return Err(TidepoolError::math("pool asset balance must be positive"));
    }
    if staker_units <= Decimal::ZERO {
        return Err(TidepoolError::math("staker units must be positive"));
    }
    if staker_units > pool_units {
        return Err(TidepoolError::math("staker units exceed pool units"));
    }

    let bps = Decimal::from(basis_points);
    let max_bps = Decimal::from(constants::MAX_WITHDRAW_BASIS_POINTS);

    // Withdrawing everything from the whole pool must drain it exactly.
    let (rune, asset) = if staker_units == pool_units && bps == max_bps {
        (pool_rune, pool_asset)
    } else {
        let burned_share = |balance: Decimal| -> Result<Decimal> {
            Ok(scaled(&[staker_units, balance, bps], &[pool_units, max_bps], "unstake")?.floor())
        };
        (burned_share(pool_rune)?, burned_share(pool_asset)?)
    };

    let units_removed = scaled(&[staker_units, bps], &[max_bps], "unstake")?.floor();
    Ok(UnstakeAmounts {
        rune,
        asset,
        units_removed,
        remaining_units: staker_units - units_removed,
    })
}

fn swap_preconditions(input: Amount, input_balance: Amount, output_balance: Amount) -> Result<()> {
    if input <= Decimal::ZERO {
        return Err(TidepoolError::math("swap input must be positive"));
    }
    if input_balance <= Decimal::ZERO || output_balance <= Decimal::ZERO {
        return Err(TidepoolError::math("pool balances must be positive to swap"));
    }
    Ok(())
}

/// Pool output for swapping `input` into a pool holding `input_balance`
/// of the input asset and `output_balance` of the output asset.
///
/// `y = x * X * Y / (x + X)^2`
pub fn calculate_swap_output(input: Amount, input_balance: Amount, output_balance: Amount) -> Result<Amount> {
    swap_preconditions(input, input_balance, output_balance)?;
    let sum = add(input, input_balance, "swap output")?;
    Ok(scaled(&[input, input_balance, output_balance], &[sum, sum], "swap output")?.floor())
}

/// Liquidity fee kept by the pool, in output-asset units.
///
/// `fee = x^2 * Y / (x + X)^2`
pub fn calculate_liquidity_fee(input: Amount, input_balance: Amount, output_balance: Amount) -> Result<Amount> {
    swap_preconditions(input, input_balance, output_balance)?;
    let sum = add(input, input_balance, "liquidity fee")?;
    Ok(scaled(&[input, input, output_balance], &[sum, sum], "liquidity fee")?.floor())
}

/// Price impact of a swap, in basis points.
///
/// `slip = x * (2X + x) / X^2`
pub fn calculate_trade_slip(input: Amount, input_balance: Amount) -> Result<Amount> {
    if input_balance <= Decimal::ZERO {
        return Err(TidepoolError::math("pool balance must be positive"));
    }
    if input.is_sign_negative() {
        return Err(TidepoolError::math("swap input cannot be negative"));
    }
    let spread = add(add(input_balance, input_balance, "trade slip")?, input, "trade slip")?;
    let bps = Decimal::from(constants::MAX_WITHDRAW_BASIS_POINTS);
    Ok(scaled(&[input, spread, bps], &[input_balance, input_balance], "trade slip")?.floor())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn first_stake_into_empty_pool() {
        assert_eq!(calculate_pool_units(d(0), d(0), d(200), d(300)).unwrap(), d(250));
    }

    #[test]
    fn proportional_stake_keeps_ownership() {
        // 200/300 pool with 250 units; adding half again issues half the units.
        assert_eq!(calculate_pool_units(d(200), d(300), d(100), d(150)).unwrap(), d(125));
    }

    #[test]
    fn asymmetric_stake_is_penalized() {
        let symmetric = calculate_pool_units(d(1_000), d(1_000), d(100), d(100)).unwrap();
        let one_sided = calculate_pool_units(d(1_000), d(1_000), d(200), d(0)).unwrap();
        assert!(one_sided < symmetric);
    }

    #[test]
    fn stake_into_zero_side_fails() {
        let err = calculate_pool_units(d(0), d(0), d(100), d(0)).unwrap_err();
        assert!(matches!(err, TidepoolError::MathPrecondition { .. }));
        assert!(calculate_pool_units(d(0), d(0), d(0), d(100)).is_err());
        assert!(calculate_pool_units(d(-1), d(10), d(1), d(1)).is_err());
    }

    #[test]
    fn huge_balances_use_ratio_form() {
        let big = Decimal::from(10_i64.pow(18));
        let units = calculate_pool_units(big, big, big, big).unwrap();
        // Doubling a balanced pool issues as many units as the pool's side sum / 2.
        assert_eq!(units, Decimal::from(10_i64.pow(18)));
    }

    #[test]
    fn full_unstake_returns_everything() {
        let out = calculate_unstake(d(250), d(200), d(300), d(250), 10_000).unwrap();
        assert_eq!(out.rune, d(200));
        assert_eq!(out.asset, d(300));
        assert_eq!(out.units_removed, d(250));
        assert!(out.remaining_units.is_zero());
    }

    #[test]
    fn partial_unstake() {
        let out = calculate_unstake(d(1_000), d(2_000), d(4_000), d(500), 2_500).unwrap();
        assert_eq!(out.rune, d(250));
        assert_eq!(out.asset, d(500));
        assert_eq!(out.units_removed, d(125));
        assert_eq!(out.remaining_units, d(375));
    }

    #[test]
    fn unstake_preconditions() {
        assert!(matches!(
            calculate_unstake(d(100), d(100), d(100), d(10), 0),
            Err(TidepoolError::InvalidBasisPoints(0))
        ));
        assert!(matches!(
            calculate_unstake(d(100), d(100), d(100), d(10), 10_001),
            Err(TidepoolError::InvalidBasisPoints(10_001))
        ));
        assert!(calculate_unstake(d(0), d(100), d(100), d(10), 100).is_err());
        assert!(calculate_unstake(d(100), d(0), d(100), d(10), 100).is_err());
        assert!(calculate_unstake(d(100), d(100), d(100), d(0), 100).is_err());
        assert!(calculate_unstake(d(100), d(100), d(100), d(101), 100).is_err());
    }

    #[test]
    fn swap_curve() {
        assert_eq!(calculate_swap_output(d(100), d(1_000), d(1_000)).unwrap(), d(82));
        assert_eq!(calculate_liquidity_fee(d(100), d(1_000), d(1_000)).unwrap(), d(8));
        assert_eq!(calculate_trade_slip(d(100), d(1_000)).unwrap(), d(2_100));
    }

    #[test]
    fn larger_trades_get_worse_prices() {
        let small = calculate_swap_output(d(10), d(10_000), d(10_000)).unwrap();
        let large = calculate_swap_output(d(1_000), d(10_000), d(10_000)).unwrap();
        assert!(large / d(1_000) < small / d(10));
    }

    #[test]
    fn swap_preconditions_fail() {
        assert!(calculate_swap_output(d(0), d(100), d(100)).is_err());
        assert!(calculate_swap_output(d(10), d(0), d(100)).is_err());
        assert!(calculate_swap_output(d(10), d(100), d(0)).is_err());
        assert!(calculate_trade_slip(d(10), d(0)).is_err());
    }
}
