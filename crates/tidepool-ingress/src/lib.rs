//! # tidepool-ingress
//!
//! **Observation Plane**: turns independently submitted observations of
//! external-chain transactions into finalized, exactly-once facts.
//!
//! ## Architecture
//!
//! 1. **NodeRegistry**: the membership collaborator's view: active node set,
//!    authorized observers, quorum fraction, operator bonds
//! 2. **ObserverGate**: hard gate that rejects observations from inactive or
//!    unauthorized signers and malformed transactions
//! 3. **VoterBook**: one [`ObservedTxVoter`] per transaction id, accumulating
//!    signers per content variant until one variant reaches quorum
//!
//! ## Observation Flow
//!
//! ```text
//! signer → ObserverGate.admit() → VoterBook.record()
//!        → FirstTimeFinalized → settlement
//! ```
//!
//! A transaction id finalizes at most once. Later observations are kept for
//! audit but never re-trigger settlement.

pub mod node_registry;
pub mod observer_gate;
pub mod voter;

pub use node_registry::{NodeAccount, NodeAccounts, NodeRegistry, NodeStatus};
pub use observer_gate::ObserverGate;
pub use voter::{ObservedTxVoter, VoteOutcome, VoterBook};
