//! # tidepool-amm
//!
//! **Pure pool arithmetic for Tidepool.**
//!
//! The AMM is the compute plane of settlement: given pool balances and a
//! deposit, withdrawal or trade, it produces new balances and units. It has:
//!
//! - **No custody**: vault balances are the settlement layer's concern
//! - **Deterministic output**: same inputs give the same floored amounts on every node
//! - **All-or-nothing updates**: a failed instruction leaves the book untouched
//!
//! ## Formulas
//!
//! With pool balances `R` (base asset) and `A` (paired asset), after-deposit
//! balances `R'`, `A'` and deposits `r`, `a`:
//!
//! ```text
//! stake units   = (R' + A') * (r*A' + R'*a) / (4 * R' * A')
//! swap output   = x * X * Y / (x + X)^2
//! liquidity fee = x^2 * Y / (x + X)^2
//! trade slip    = x * (2X + x) / X^2          (basis points)
//! ```

pub mod math;
pub mod pool_book;

pub use math::{
    calculate_liquidity_fee, calculate_pool_units, calculate_swap_output, calculate_trade_slip,
    calculate_unstake, UnstakeAmounts,
};
pub use pool_book::{PoolBook, StakeOutcome, SwapLeg, SwapOutcome, UnstakeOutcome};
