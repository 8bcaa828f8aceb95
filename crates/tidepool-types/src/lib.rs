//! # tidepool-types
//!
//! Shared types, errors, and configuration for the **Tidepool** settlement core.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`TxId`], [`PubKey`], [`NodeAddress`], [`Address`], [`Chain`]
//! - **Value model**: [`Asset`], [`Coin`], [`Coins`]
//! - **Observation model**: [`ExternalTx`], [`Observation`], [`Direction`]
//! - **Custody model**: [`Vault`], [`VaultType`], [`VaultStatus`]
//! - **Liquidity model**: [`Pool`], [`PoolStatus`], [`StakerUnit`]
//! - **Outbound model**: [`OutboundItem`], [`OutboundKey`]
//! - **Instructions**: [`Memo`], [`AdminMemo`], [`AdminKind`]
//! - **Events**: [`Event`], [`EventKind`], [`EventStatus`]
//! - **Gas**: [`GasEstimate`]
//! - **Configuration**: [`SettlementConfig`], [`QuorumFraction`]
//! - **Errors**: [`TidepoolError`] with `TP_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod coin;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod gas;
pub mod ids;
pub mod memo;
pub mod outbound;
pub mod pool;
pub mod tx;
pub mod vault;

// Re-export all primary types at crate root for ergonomic imports:
//   use tidepool_types::{Asset, Coin, Coins, ExternalTx, Pool, ...};

pub use coin::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use gas::*;
pub use ids::*;
pub use memo::*;
pub use outbound::*;
pub use pool::*;
pub use tx::*;
pub use vault::*;

// Constants are accessed via `tidepool_types::constants::FOO`
// (not re-exported to avoid name collisions).
