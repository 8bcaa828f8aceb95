//! Settlement events.
//!
//! Events are immutable, append-only records exposed to external indexers.
//! The settlement layer assigns sequential ids; nothing ever rewrites one.

use serde::{Deserialize, Serialize};

use crate::{Address, Amount, Asset, Chain, Coin, Coins, NodeAddress, PoolStatus, TxId};

/// Outcome recorded with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    Success,
    /// Accepted but not complete: a stake waiting on its matching deposit,
    /// or a refund waiting for a vault that can pay it.
    Pending,
    /// The inbound was returned to the sender.
    Refund,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Stake {
        pool: Asset,
        staker: Address,
        rune_amount: Amount,
        asset_amount: Amount,
        units: Amount,
    },
    Unstake {
        pool: Asset,
        staker: Address,
        basis_points: u64,
        rune_amount: Amount,
        asset_amount: Amount,
        units: Amount,
    },
    Swap {
        pool: Asset,
        input: Coin,
        output: Coin,
        trade_target: Amount,
        liquidity_fee: Amount,
        trade_slip: Amount,
    },
    Add {
        pool: Asset,
        rune_amount: Amount,
        asset_amount: Amount,
    },
    Refund {
        code: String,
        reason: String,
        coins: Coins,
    },
    Slash {
        node: NodeAddress,
        pool: Asset,
        stolen: Coin,
        bond_slashed: Amount,
    },
    Pool {
        pool: Asset,
        status: PoolStatus,
    },
    AdminConfig {
        key: String,
        value: String,
    },
    Gas {
        chain: Chain,
        gas: Coin,
        rune_reimbursed: Amount,
    },
    Outbound {
        in_hash: TxId,
        coins: Coins,
    },
}

impl EventKind {
    /// Short lowercase type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Stake { .. } => "stake",
            Self::Unstake { .. } => "unstake",
            Self::Swap { .. } => "swap",
            Self::Add { .. } => "add",
            Self::Refund { .. } => "refund",
            Self::Slash { .. } => "slash",
            Self::Pool { .. } => "pool",
            Self::AdminConfig { .. } => "admin_config",
            Self::Gas { .. } => "gas",
            Self::Outbound { .. } => "outbound",
        }
    }
}

/// One settlement event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    /// Processing height at which the event was emitted.
    pub height: u64,
    /// Inbound fact that caused the event.
    pub in_hash: TxId,
    pub status: EventStatus,
    pub kind: EventKind,
}
