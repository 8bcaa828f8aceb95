//! Error types for the Tidepool settlement core.
//!
//! All errors use the `TP_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation errors (memo, address, asset, observation)
//! - 2xx: Funds errors (vault balances, vault lifecycle)
//! - 3xx: Pool / AMM errors
//! - 4xx: Consensus errors
//! - 5xx: Outbound queue errors
//! - 6xx: Settlement errors
//! - 9xx: General / internal errors
//!
//! Two outcomes that look like failures are deliberately *not* errors: a
//! transaction that has not yet reached quorum, and a replay of an already
//! finalized transaction. Those are reported as vote outcomes by the voter.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{Address, Asset, PubKey, TxId, VaultStatus};

/// Coarse classification of an error, used by the orchestrator to decide
/// between rejecting an instruction outright and refunding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input. Rejected before any state is touched.
    Validation,
    /// A vault or pool lacked the required balance.
    InsufficientFunds,
    /// AMM preconditions (zero units, zero balances) did not hold.
    MathPrecondition,
    /// Anything else.
    Internal,
}

/// Central error enum for all Tidepool operations.
#[derive(Debug, Error)]
pub enum TidepoolError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// The memo could not be parsed into a known instruction.
    #[error("TP_ERR_100: Invalid memo: {reason}")]
    InvalidMemo { reason: String },

    /// An external-chain address was empty or malformed.
    #[error("TP_ERR_101: Invalid address: {0:?}")]
    InvalidAddress(String),

    /// An asset string was not `CHAIN.SYMBOL` or `SYMBOL`.
    #[error("TP_ERR_102: Invalid asset: {0:?}")]
    InvalidAsset(String),

    /// A transaction hash had the wrong length or alphabet.
    #[error("TP_ERR_103: Invalid tx id: {0:?}")]
    InvalidTxId(String),

    /// The observation failed basic validation.
    #[error("TP_ERR_104: Invalid observation: {reason}")]
    InvalidObservation { reason: String },

    /// Withdraw basis points outside (0, 10000].
    #[error("TP_ERR_105: Invalid withdraw basis points: {0}")]
    InvalidBasisPoints(u64),

    /// A public key was not valid hex.
    #[error("TP_ERR_106: Invalid public key: {0:?}")]
    InvalidPubKey(String),

    // =================================================================
    // Funds Errors (2xx)
    // =================================================================
    /// The vault holds less of the asset than requested.
    #[error("TP_ERR_200: Insufficient funds in vault {vault} for {asset}: need {needed}, have {available}")]
    InsufficientFunds {
        vault: PubKey,
        asset: Asset,
        needed: Decimal,
        available: Decimal,
    },

    /// No vault with this public key exists.
    #[error("TP_ERR_201: Vault not found: {0}")]
    VaultNotFound(PubKey),

    /// No active vault can afford the outbound coin.
    #[error("TP_ERR_202: No active vault can pay {amount} {asset}")]
    NoVaultCanPay { asset: Asset, amount: Decimal },

    /// A vault status change that the lifecycle does not allow.
    #[error("TP_ERR_203: Invalid vault transition: {from} -> {to}")]
    InvalidVaultTransition { from: VaultStatus, to: VaultStatus },

    // =================================================================
    // Pool / AMM Errors (3xx)
    // =================================================================
    /// No pool exists for the asset.
    #[error("TP_ERR_300: Pool not found: {0}")]
    PoolNotFound(Asset),

    /// A pool for the asset already exists.
    #[error("TP_ERR_301: Pool already exists: {0}")]
    PoolAlreadyExists(Asset),

    /// The pool's status does not allow the operation.
    #[error("TP_ERR_302: Pool {asset} is not available: {reason}")]
    PoolUnavailable { asset: Asset, reason: String },

    /// The depositor's recorded asset address differs from the one supplied.
    #[error("TP_ERR_303: Staker asset address mismatch: recorded {recorded}, supplied {supplied}")]
    StakerAddressMismatch { recorded: Address, supplied: Address },

    /// The staker holds no units in the pool.
    #[error("TP_ERR_304: Nothing to withdraw for {0}")]
    NothingToWithdraw(Address),

    /// AMM formula preconditions failed (zero units, zero balances, ...).
    #[error("TP_ERR_305: Math precondition failed: {reason}")]
    MathPrecondition { reason: String },

    /// A checked decimal operation overflowed.
    #[error("TP_ERR_306: Arithmetic overflow in {op}")]
    MathOverflow { op: &'static str },

    /// The swap output fell short of the caller's trade target.
    #[error("TP_ERR_307: Trade target not met: wanted at least {target}, pool offers {output}")]
    TradeTargetNotMet { target: Decimal, output: Decimal },

    /// A stake carried no value on either side.
    #[error("TP_ERR_308: Stake amounts are both zero")]
    EmptyStake,

    // =================================================================
    // Consensus Errors (4xx)
    // =================================================================
    /// The signer is not an active, authorized observer.
    #[error("TP_ERR_400: Signer not authorized: {0}")]
    NotAuthorized(String),

    /// The active node set is empty; no quorum is reachable.
    #[error("TP_ERR_401: Active node set is empty")]
    NoActiveNodes,

    // =================================================================
    // Outbound Errors (5xx)
    // =================================================================
    /// An item with this origin/destination/asset is already staged or claimed.
    #[error("TP_ERR_500: Outbound already staged for {in_hash} -> {to_address}")]
    DuplicateOutbound { in_hash: TxId, to_address: Address },

    /// The outbound in-hash has already been marked settled.
    #[error("TP_ERR_501: Outbound already settled: {0}")]
    OutboundAlreadySettled(TxId),

    // =================================================================
    // Settlement Errors (6xx)
    // =================================================================
    /// Settlement of an instruction failed.
    #[error("TP_ERR_600: Settlement failed: {reason}")]
    SettlementFailed { reason: String },

    /// An ADMIN memo came from an address that is not an administrator.
    #[error("TP_ERR_601: Admin instruction from unauthorized address {0}")]
    AdminNotAuthorized(Address),

    /// A query path that the query surface does not serve.
    #[error("TP_ERR_602: Unknown query path: {0:?}")]
    UnknownQuery(String),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("TP_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("TP_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("TP_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error (disk, network).
    #[error("TP_ERR_903: I/O error: {0}")]
    Io(String),
}

impl TidepoolError {
    /// Map this error onto the settlement error taxonomy.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidMemo { .. }
            | Self::InvalidAddress(_)
            | Self::InvalidAsset(_)
            | Self::InvalidTxId(_)
            | Self::InvalidObservation { .. }
            | Self::InvalidBasisPoints(_)
            | Self::InvalidPubKey(_)
            | Self::NotAuthorized(_)
            | Self::AdminNotAuthorized(_)
            | Self::UnknownQuery(_)
            | Self::StakerAddressMismatch { .. }
            | Self::PoolNotFound(_)
            | Self::PoolAlreadyExists(_)
            | Self::PoolUnavailable { .. }
            | Self::NothingToWithdraw(_)
            | Self::TradeTargetNotMet { .. }
            | Self::EmptyStake
            | Self::DuplicateOutbound { .. } => ErrorClass::Validation,
            Self::InsufficientFunds { .. } | Self::NoVaultCanPay { .. } => {
                ErrorClass::InsufficientFunds
            }
            Self::MathPrecondition { .. } | Self::MathOverflow { .. } => {
                ErrorClass::MathPrecondition
            }
            _ => ErrorClass::Internal,
        }
    }

    /// Shorthand for a [`TidepoolError::MathPrecondition`].
    pub fn math(reason: impl Into<String>) -> Self {
        Self::MathPrecondition {
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`TidepoolError::InvalidMemo`].
    pub fn memo(reason: impl Into<String>) -> Self {
        Self::InvalidMemo {
            reason: reason.into(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, TidepoolError>;

// Conversion from std::io::Error
impl From<std::io::Error> for TidepoolError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TidepoolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = TidepoolError::PoolNotFound(Asset::bnb());
        let msg = format!("{err}");
        assert!(msg.starts_with("TP_ERR_300"), "Got: {msg}");
        assert!(msg.contains("BNB.BNB"));
    }

    #[test]
    fn insufficient_funds_display() {
        let err = TidepoolError::InsufficientFunds {
            vault: PubKey::from_bytes(vec![1, 2, 3]),
            asset: Asset::bnb(),
            needed: Decimal::new(100, 0),
            available: Decimal::new(50, 0),
        };
        let msg = format!("{err}");
        assert!(msg.contains("TP_ERR_200"));
        assert!(msg.contains("010203"));
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn classes_follow_taxonomy() {
        assert_eq!(TidepoolError::memo("x").class(), ErrorClass::Validation);
        assert_eq!(TidepoolError::math("x").class(), ErrorClass::MathPrecondition);
        assert_eq!(
            TidepoolError::MathOverflow { op: "mul" }.class(),
            ErrorClass::MathPrecondition
        );
        assert_eq!(
            TidepoolError::NoVaultCanPay {
                asset: Asset::bnb(),
                amount: Decimal::ONE,
            }
            .class(),
            ErrorClass::InsufficientFunds
        );
        assert_eq!(
            TidepoolError::Internal("boom".into()).class(),
            ErrorClass::Internal
        );
    }

    #[test]
    fn all_errors_have_tp_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(TidepoolError::EmptyStake),
            Box::new(TidepoolError::NoActiveNodes),
            Box::new(TidepoolError::InvalidBasisPoints(0)),
            Box::new(TidepoolError::Internal("test".into())),
            Box::new(TidepoolError::TradeTargetNotMet {
                target: Decimal::ONE,
                output: Decimal::ZERO,
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("TP_ERR_"),
                "Error missing TP_ERR_ prefix: {msg}"
            );
        }
    }
}
