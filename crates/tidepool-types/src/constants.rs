//! System-wide constants for the Tidepool settlement core.

/// One whole unit of any asset, expressed in base units (10^8).
pub const ONE: i64 = 100_000_000;

/// Number of decimal places carried by one whole unit.
pub const UNIT_DECIMALS: u32 = 8;

/// Withdraw basis points representing 100% of a staker's units.
pub const MAX_WITHDRAW_BASIS_POINTS: u64 = 10_000;

/// Default fixed per-transaction fee, in base-asset units (1 whole unit).
pub const DEFAULT_TRANSACTION_FEE: i64 = ONE;

/// Default quorum fraction numerator (2/3 strict supermajority).
pub const DEFAULT_QUORUM_NUMERATOR: u64 = 2;

/// Default quorum fraction denominator.
pub const DEFAULT_QUORUM_DENOMINATOR: u64 = 3;

/// Default divisor for the gas estimate moving average.
pub const DEFAULT_GAS_SMOOTHING_WEIGHT: u64 = 4;

/// Default slash multiplier applied to stolen value, in basis points (1.5x).
pub const DEFAULT_SLASH_MULTIPLIER_BPS: u64 = 15_000;

/// Number of settled outbound in-hashes remembered before the oldest is evicted.
pub const OUTBOUND_GUARD_CACHE_SIZE: usize = 500_000;

/// Native settlement asset used when no configuration overrides it.
pub const DEFAULT_BASE_ASSET: &str = "BNB.RUNE-A1F";

/// Chain assumed for assets written without a `CHAIN.` prefix.
pub const DEFAULT_CHAIN: &str = "BNB";

/// Longest address accepted from a memo or observation.
pub const MAX_ADDRESS_LEN: usize = 128;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Tidepool";
