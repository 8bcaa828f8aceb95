//! Settlement orchestrator.
//!
//! The [`Settler`] is the single writer of settlement state. Every signer
//! submission passes the observer gate and the voter; only the vote that
//! first finalizes a transaction triggers settlement, so a fact is applied
//! exactly once however often, and in whatever order, it is delivered.
//!
//! Settlement of one fact is all-or-nothing: it runs against a [`Txn`]
//! working copy of the ledger which replaces the live state on success.
//!
//! - An inbound deposit is credited to its vault, then its memo is applied.
//!   If the instruction fails, the deposit is refunded (less the fee). If
//!   no vault can pay the refund, the deposit stays credited and a pending
//!   refund event records it.
//! - An outbound completion debits the paying vault, settles the items it
//!   pays, reimburses gas and slashes the operator for anything unowed.

use rust_decimal::Decimal;
use tidepool_ingress::{NodeAccounts, NodeRegistry, ObserverGate, VoteOutcome, VoterBook};
use tidepool_types::{
    constants, Coins, Direction, EventKind, EventStatus, Memo, NodeAddress, Observation,
    OutboundItem, PubKey, Result, SettlementConfig, TxId,
};

use crate::ledger::{Changes, LedgerState, Theft, Txn};
use crate::{EventLog, OutboundGuard, VaultLedger};

/// What a submission led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// Recorded; no variant has reached quorum yet.
    Pending,
    /// The transaction was settled by an earlier submission.
    AlreadyFinalized,
    /// This submission finalized the transaction and it was applied.
    Applied { events: Vec<u64> },
    /// This submission finalized an inbound whose instruction failed; the
    /// deposit was refunded.
    Refunded { reason: String, events: Vec<u64> },
    /// The instruction failed and its refund could not be staged. The
    /// deposit is kept in custody with a pending refund event.
    Held { reason: String, events: Vec<u64> },
}

impl Settlement {
    /// Ids of the events this submission emitted.
    #[must_use]
    pub fn events(&self) -> &[u64] {
        match self {
            Self::Applied { events } | Self::Refunded { events, .. } | Self::Held { events, .. } => {
                events
            }
            Self::Pending | Self::AlreadyFinalized => &[],
        }
    }
}

/// Settlement core for one node.
pub struct Settler<R: NodeRegistry = NodeAccounts> {
    config: SettlementConfig,
    registry: R,
    gate: ObserverGate,
    voters: VoterBook,
    state: LedgerState,
    guard: OutboundGuard,
    events: EventLog,
    /// Current processing height.
    height: u64,
}

impl<R: NodeRegistry> Settler<R> {
    /// Create a settler with empty state.
    ///
    /// # Errors
    /// `Configuration` if `config` does not validate.
    pub fn new(config: SettlementConfig, registry: R) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            engine = constants::ENGINE_NAME,
            version = constants::VERSION,
            base_asset = %config.base_asset,
            "settler started"
        );
        Ok(Self {
            state: LedgerState::new(&config),
            guard: OutboundGuard::new(config.outbound_guard_capacity),
            config,
            registry,
            gate: ObserverGate::new(),
            voters: VoterBook::new(),
            events: EventLog::new(),
            height: 0,
        })
    }

    /// Advance the processing height. Heights never move backwards.
    pub fn set_height(&mut self, height: u64) {
        self.height = self.height.max(height);
    }

    #[must_use]
    pub fn height(&self) -> u64 {
        self.height
    }

    #[must_use]
    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut R {
        &mut self.registry
    }

    #[must_use]
    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    #[must_use]
    pub fn voters(&self) -> &VoterBook {
        &self.voters
    }

    #[must_use]
    pub fn gate(&self) -> &ObserverGate {
        &self.gate
    }

    #[must_use]
    pub fn guard(&self) -> &OutboundGuard {
        &self.guard
    }

    /// Vault lifecycle is driven by membership changes outside the core.
    pub fn vaults_mut(&mut self) -> &mut VaultLedger {
        &mut self.state.vaults
    }

    // -----------------------------------------------------------------
    // Ingress
    // -----------------------------------------------------------------

    /// Handle one signer's observation of `tx_id`.
    ///
    /// # Errors
    /// - Gate rejections (`NotAuthorized`, `NoActiveNodes`, `InvalidObservation`);
    ///   nothing is recorded
    /// - On the finalizing vote: `VaultNotFound` for an unknown vault, or
    ///   `InsufficientFunds` for a completion the vault cannot cover. The
    ///   fact stays finalized and no state changes.
    pub fn submit_observation(
        &mut self,
        tx_id: &TxId,
        observation: Observation,
        signer: &NodeAddress,
    ) -> Result<Settlement> {
        self.gate.admit(&self.registry, tx_id, &observation, signer)?;
        let active = self.registry.active_nodes();
        let quorum = self.registry.quorum();
        match self
            .voters
            .record(tx_id, observation, signer.clone(), &active, quorum, self.height)?
        {
            VoteOutcome::Pending => Ok(Settlement::Pending),
            VoteOutcome::AlreadyFinalized => Ok(Settlement::AlreadyFinalized),
            VoteOutcome::FirstTimeFinalized(canonical) => match canonical.direction {
                Direction::Inbound => self.settle_inbound(&canonical),
                Direction::Outbound => self.settle_outbound(&canonical),
            },
        }
    }

    /// Hand the outbound batch staged at `height` to the signer.
    pub fn claim_outbound(&mut self, height: u64) -> Vec<OutboundItem> {
        self.state.outbound.claim_batch(height)
    }

    /// Move a retiring vault's funds into an active vault once it owes
    /// nothing.
    ///
    /// # Errors
    /// See [`LedgerState::migrate_vault`].
    pub fn migrate_vault(&mut self, from: &PubKey, to: &PubKey) -> Result<Coins> {
        self.state.migrate_vault(from, to)
    }

    // -----------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------

    /// Working copy of the ledger with `obs`'s deposit credited.
    fn credited(&self, obs: &Observation) -> Result<Txn<'_>> {
        let mut state = self.state.clone();
        state.vaults.credit_all(&obs.observed_pubkey, &obs.tx.coins)?;
        Ok(Txn::new(state, &self.config, self.height, obs.tx.id.clone()))
    }

    fn settle_inbound(&mut self, obs: &Observation) -> Result<Settlement> {
        let tx = &obs.tx;
        let mut txn = self.credited(obs)?;
        let cause = match Memo::parse(&tx.memo).and_then(|memo| txn.apply_inbound(&memo, obs)) {
            Ok(()) => {
                let (state, changes) = txn.into_parts();
                let events = self.commit(state, changes, &tx.id);
                tracing::info!(tx = %tx.id, events = events.len(), "inbound settled");
                return Ok(Settlement::Applied { events });
            }
            Err(err) => err,
        };

        // The deposit stays credited; only the instruction is discarded.
        tracing::warn!(tx = %tx.id, memo = %tx.memo, error = %cause, "inbound refunded");
        let mut txn = self.credited(obs)?;
        if let Err(refund_err) = txn.refund_inbound(obs, &cause) {
            tracing::error!(tx = %tx.id, error = %refund_err, "refund cannot be staged, deposit held");
            let mut txn = self.credited(obs)?;
            txn.hold_inbound(obs, &cause, &refund_err);
            let (state, changes) = txn.into_parts();
            let events = self.commit(state, changes, &tx.id);
            return Ok(Settlement::Held {
                reason: refund_err.to_string(),
                events,
            });
        }
        let (state, changes) = txn.into_parts();
        let events = self.commit(state, changes, &tx.id);
        Ok(Settlement::Refunded {
            reason: cause.to_string(),
            events,
        })
    }

    fn settle_outbound(&mut self, obs: &Observation) -> Result<Settlement> {
        let tx = &obs.tx;
        let mut txn = Txn::new(self.state.clone(), &self.config, self.height, tx.id.clone());
        if let Err(err) = txn.complete_outbound(obs, &self.guard) {
            tracing::error!(tx = %tx.id, vault = %obs.observed_pubkey.short(), error = %err, "outbound completion rejected");
            return Err(err);
        }
        let (state, changes) = txn.into_parts();
        let events = self.commit(state, changes, &tx.id);
        tracing::info!(tx = %tx.id, events = events.len(), "outbound settled");
        Ok(Settlement::Applied { events })
    }

    /// Install a working state and apply its side effects.
    fn commit(&mut self, state: LedgerState, changes: Changes, in_hash: &TxId) -> Vec<u64> {
        self.state = state;
        for key in changes.settled {
            if let Err(err) = self.guard.mark_settled(key) {
                tracing::error!(error = %err, "outbound settled twice");
            }
        }
        let mut ids = Vec::with_capacity(changes.events.len());
        for (status, kind) in changes.events {
            ids.push(self.events.append(self.height, in_hash.clone(), status, kind));
        }
        for theft in changes.thefts {
            if let Some(id) = self.slash(theft, in_hash) {
                ids.push(id);
            }
        }
        ids
    }

    /// Charge the operator of the paying vault for a theft and make the
    /// pool whole from the slashed bond. The excess goes to the reserve.
    fn slash(&mut self, theft: Theft, in_hash: &TxId) -> Option<u64> {
        let Theft {
            vault,
            stolen,
            value,
        } = theft;
        let penalty = (value * Decimal::from(self.config.slash_multiplier_bps)
            / Decimal::from(constants::MAX_WITHDRAW_BASIS_POINTS))
        .floor();
        let node = self.registry.operator_of(&vault);
        let taken = node
            .as_ref()
            .map_or(Decimal::ZERO, |n| self.registry.slash_bond(n, penalty));

        let to_pool = if self.config.is_base_asset(&stolen.asset) {
            Decimal::ZERO
        } else {
            taken.min(value)
        };
        self.state.pools.cover_loss(&stolen.asset, stolen.amount, to_pool);
        self.state.reserve += taken - to_pool;

        let Some(node) = node else {
            tracing::error!(vault = %vault.short(), %stolen, "theft from a vault without an operator");
            return None;
        };
        tracing::warn!(%node, %stolen, %penalty, %taken, "operator slashed");
        Some(self.events.append(
            self.height,
            in_hash.clone(),
            EventStatus::Success,
            EventKind::Slash {
                node,
                pool: stolen.asset.clone(),
                stolen,
                bond_slashed: taken,
            },
        ))
    }
}
