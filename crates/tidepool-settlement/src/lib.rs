//! # tidepool-settlement
//!
//! **Settlement orchestrator**: turns finalized observations into ledger
//! updates, outbound payments and events.
//!
//! ## Flow
//!
//! ```text
//! signer ─► ObserverGate ─► VoterBook ─► (first finalization) ─► Settler
//!                                                                  │
//!        ┌───────────────┬──────────────┬──────────────┬───────────┤
//!        ▼               ▼              ▼              ▼           ▼
//!   VaultLedger      PoolBook     OutboundQueue    EventLog   OutboundGuard
//! ```
//!
//! 1. Inbound deposits credit the receiving vault, then run the memo's
//!    instruction (create, stake, add, withdraw, swap, admin). A failed
//!    instruction refunds the deposit instead.
//! 2. Outbound completions debit the paying vault, settle the staged items
//!    they pay and slash the operator for anything paid without cause.
//! 3. The external signer claims staged payments per height with
//!    [`Settler::claim_outbound`].
//!
//! All state is read through [`Settler::query`].

mod completion;
pub mod event_log;
pub mod gas_tracker;
mod instructions;
pub mod ledger;
pub mod outbound_guard;
pub mod outbound_queue;
pub mod query;
pub mod settler;
pub mod vault_ledger;

pub use event_log::EventLog;
pub use gas_tracker::GasTracker;
pub use ledger::LedgerState;
pub use outbound_guard::OutboundGuard;
pub use outbound_queue::OutboundQueue;
pub use settler::{Settlement, Settler};
pub use vault_ledger::VaultLedger;
