//! Observer gate: hard check applied to every submitted observation.
//!
//! Nothing reaches the voter unless the signer is an active, authorized
//! observer and the transaction is well-formed. A rejected observation
//! never touches voting or ledger state.

use std::collections::HashMap;

use tidepool_types::{NodeAddress, Observation, Result, TidepoolError, TxId};

use crate::NodeRegistry;

/// Gate in front of the [`VoterBook`](crate::VoterBook).
#[derive(Default)]
pub struct ObserverGate {
    /// Rejected submissions per signer, for audit.
    rejections: HashMap<NodeAddress, usize>,
    admitted: u64,
}

impl ObserverGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check one submission.
    ///
    /// # Errors
    /// - `NoActiveNodes` if the active set is empty
    /// - `NotAuthorized` if the signer is not an active observer
    /// - `InvalidObservation` if the id does not match or the transaction is malformed
    pub fn admit(
        &mut self,
        registry: &dyn NodeRegistry,
        tx_id: &TxId,
        observation: &Observation,
        signer: &NodeAddress,
    ) -> Result<()> {
        let verdict = Self::check(registry, tx_id, observation, signer);
        match &verdict {
            Ok(()) => self.admitted += 1,
            Err(err) => {
                *self.rejections.entry(signer.clone()).or_insert(0) += 1;
                tracing::warn!(%signer, %tx_id, error = %err, "observation rejected");
            }
        }
        verdict
    }

    fn check(
        registry: &dyn NodeRegistry,
        tx_id: &TxId,
        observation: &Observation,
        signer: &NodeAddress,
    ) -> Result<()> {
        if registry.active_nodes().is_empty() {
            return Err(TidepoolError::NoActiveNodes);
        }
        if !registry.is_authorized_observer(signer) {
            return Err(TidepoolError::NotAuthorized(signer.to_string()));
        }
        if observation.tx.id != *tx_id {
            return Err(TidepoolError::InvalidObservation {
                reason: format!("observation is for {}, submitted as {tx_id}", observation.tx.id),
            });
        }
        if tx_id.is_blank() {
            return Err(TidepoolError::InvalidObservation {
                reason: "blank tx id is reserved for internal transactions".to_string(),
            });
        }
        observation.tx.validate()
    }

    /// Number of rejected submissions from `signer`.
    #[must_use]
    pub fn rejections(&self, signer: &NodeAddress) -> usize {
        self.rejections.get(signer).copied().unwrap_or(0)
    }

    /// Total admitted submissions.
    #[must_use]
    pub fn admitted(&self) -> u64 {
        self.admitted
    }
}
