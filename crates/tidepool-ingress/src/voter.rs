//! Quorum voter: per-transaction accumulation of signer observations.
//!
//! Signers may disagree on what a transaction contained. Each distinct
//! content is a *variant*, keyed by [`Observation::variant_digest`], with its
//! own signer set. The first variant whose signer set exceeds the quorum
//! fraction of the active node set becomes canonical and the transaction id
//! is latched finalized. The latch is per transaction id, not per variant.

use std::collections::{BTreeSet, HashMap};

use tidepool_types::{NodeAddress, Observation, QuorumFraction, Result, TidepoolError, TxId};

/// Result of recording one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// This vote finalized the transaction; carries the canonical observation.
    FirstTimeFinalized(Observation),
    /// The transaction was finalized earlier. Nothing to settle.
    AlreadyFinalized,
    /// No variant has reached quorum yet.
    Pending,
}

/// One content variant and the signers that reported it.
#[derive(Debug, Clone)]
struct Variant {
    digest: [u8; 32],
    observation: Observation,
    signers: BTreeSet<NodeAddress>,
}

/// Voting record for one transaction id.
#[derive(Debug, Clone)]
pub struct ObservedTxVoter {
    tx_id: TxId,
    variants: Vec<Variant>,
    /// Index into `variants` of the canonical variant, once finalized.
    finalized: Option<usize>,
    /// Processing height at which finalization happened.
    finalized_height: Option<u64>,
}

impl ObservedTxVoter {
    #[must_use]
    pub fn new(tx_id: TxId) -> Self {
        Self {
            tx_id,
            variants: Vec::new(),
            finalized: None,
            finalized_height: None,
        }
    }

    #[must_use]
    pub fn tx_id(&self) -> &TxId {
        &self.tx_id
    }

    /// Add `signer`'s vote for `observation`'s variant.
    ///
    /// Only signers still in `active` count towards quorum. Quorum is
    /// re-checked on every vote, a repeated one included, so a variant
    /// that clears the threshold after the active set shrinks finalizes on
    /// its next vote.
    pub fn add(
        &mut self,
        observation: Observation,
        signer: NodeAddress,
        active: &BTreeSet<NodeAddress>,
        quorum: QuorumFraction,
        height: u64,
    ) -> VoteOutcome {
        let digest = observation.variant_digest();
        let idx = match self.variants.iter().position(|v| v.digest == digest) {
            Some(idx) => idx,
            None => {
                self.variants.push(Variant {
                    digest,
                    observation,
                    signers: BTreeSet::new(),
                });
                self.variants.len() - 1
            }
        };
        self.variants[idx].signers.insert(signer);

        if self.finalized.is_some() {
            return VoteOutcome::AlreadyFinalized;
        }

        let variant = &self.variants[idx];
        let counted = variant.signers.intersection(active).count();
        if quorum.has_majority(counted, active.len()) {
            self.finalized = Some(idx);
            self.finalized_height = Some(height);
            return VoteOutcome::FirstTimeFinalized(variant.observation.clone());
        }
        VoteOutcome::Pending
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized.is_some()
    }

    #[must_use]
    pub fn finalized_height(&self) -> Option<u64> {
        self.finalized_height
    }

    /// The canonical observation, once finalized.
    #[must_use]
    pub fn canonical(&self) -> Option<&Observation> {
        self.finalized.map(|idx| &self.variants[idx].observation)
    }

    /// Number of distinct content variants seen.
    #[must_use]
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Signers that reported the same content as `observation`.
    #[must_use]
    pub fn signers_for(&self, observation: &Observation) -> usize {
        let digest = observation.variant_digest();
        self.variants
            .iter()
            .find(|v| v.digest == digest)
            .map_or(0, |v| v.signers.len())
    }
}

/// All voters, keyed by transaction id.
#[derive(Default)]
pub struct VoterBook {
    voters: HashMap<TxId, ObservedTxVoter>,
}

impl VoterBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `signer`'s observation of `tx_id`.
    ///
    /// # Errors
    /// Returns `InvalidObservation` if the observation describes a
    /// different transaction than `tx_id`.
    pub fn record(
        &mut self,
        tx_id: &TxId,
        observation: Observation,
        signer: NodeAddress,
        active: &BTreeSet<NodeAddress>,
        quorum: QuorumFraction,
        height: u64,
    ) -> Result<VoteOutcome> {
        if observation.tx.id != *tx_id {
            return Err(TidepoolError::InvalidObservation {
                reason: format!("observation is for {}, recorded as {tx_id}", observation.tx.id),
            });
        }
        let digest = hex::encode(&observation.variant_digest()[..4]);
        let voter = self
            .voters
            .entry(tx_id.clone())
            .or_insert_with(|| ObservedTxVoter::new(tx_id.clone()));
        let outcome = voter.add(observation, signer, active, quorum, height);
        match &outcome {
            VoteOutcome::FirstTimeFinalized(_) => {
                tracing::info!(%tx_id, variant = %digest, height, "observation finalized");
            }
            VoteOutcome::Pending => {
                tracing::debug!(%tx_id, variant = %digest, "vote recorded, quorum pending");
            }
            VoteOutcome::AlreadyFinalized => {}
        }
        Ok(outcome)
    }

    #[must_use]
    pub fn get(&self, tx_id: &TxId) -> Option<&ObservedTxVoter> {
        self.voters.get(tx_id)
    }

    #[must_use]
    pub fn is_finalized(&self, tx_id: &TxId) -> bool {
        self.voters.get(tx_id).is_some_and(ObservedTxVoter::is_finalized)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.voters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use tidepool_types::*;

    use super::*;

    fn nodes(n: usize) -> Vec<NodeAddress> {
        (0..n).map(|_| NodeAddress::random()).collect()
    }

    fn observation() -> Observation {
        let coins: Coins = vec![Coin::new(Asset::bnb(), Decimal::from(10))].into_iter().collect();
        Observation::new(
            ExternalTx::dummy(coins, "STAKE:BNB.BNB"),
            1,
            PubKey::random(),
            Direction::Inbound,
        )
    }

    fn record(
        book: &mut VoterBook,
        obs: &Observation,
        signer: &NodeAddress,
        active: &BTreeSet<NodeAddress>,
    ) -> VoteOutcome {
        book.record(&obs.tx.id, obs.clone(), signer.clone(), active, QuorumFraction::two_thirds(), 1)
            .unwrap()
    }

    #[test]
    fn three_of_four_finalizes_two_does_not() {
        let signers = nodes(4);
        let active: BTreeSet<_> = signers.iter().cloned().collect();
        let obs = observation();
        let mut book = VoterBook::new();

        assert_eq!(record(&mut book, &obs, &signers[0], &active), VoteOutcome::Pending);
        assert_eq!(record(&mut book, &obs, &signers[1], &active), VoteOutcome::Pending);
        assert!(!book.is_finalized(&obs.tx.id));
        assert_eq!(
            record(&mut book, &obs, &signers[2], &active),
            VoteOutcome::FirstTimeFinalized(obs.clone())
        );
        assert_eq!(record(&mut book, &obs, &signers[3], &active), VoteOutcome::AlreadyFinalized);
        // Late vote is still kept for audit.
        assert_eq!(book.get(&obs.tx.id).unwrap().signers_for(&obs), 4);
    }

    #[test]
    fn duplicate_signer_is_a_noop() {
        let signers = nodes(4);
        let active: BTreeSet<_> = signers.iter().cloned().collect();
        let obs = observation();
        let mut book = VoterBook::new();
        for _ in 0..5 {
            assert_eq!(record(&mut book, &obs, &signers[0], &active), VoteOutcome::Pending);
        }
        assert_eq!(book.get(&obs.tx.id).unwrap().signers_for(&obs), 1);
        assert_eq!(record(&mut book, &obs, &signers[1], &active), VoteOutcome::Pending);
    }

    #[test]
    fn conflicting_variants_accumulate_separately() {
        let signers = nodes(4);
        let active: BTreeSet<_> = signers.iter().cloned().collect();
        let honest = observation();
        let mut evil = honest.clone();
        evil.tx.coins = vec![Coin::new(Asset::bnb(), Decimal::from(1_000_000))].into_iter().collect();

        let mut book = VoterBook::new();
        record(&mut book, &evil, &signers[0], &active);
        record(&mut book, &honest, &signers[1], &active);
        record(&mut book, &honest, &signers[2], &active);
        assert_eq!(book.get(&honest.tx.id).unwrap().variant_count(), 2);
        let outcome = record(&mut book, &honest, &signers[3], &active);
        assert_eq!(outcome, VoteOutcome::FirstTimeFinalized(honest.clone()));

        // The evil variant can never finalize afterwards.
        assert_eq!(record(&mut book, &evil, &signers[1], &active), VoteOutcome::AlreadyFinalized);
        assert_eq!(record(&mut book, &evil, &signers[2], &active), VoteOutcome::AlreadyFinalized);
        assert_eq!(book.get(&honest.tx.id).unwrap().canonical(), Some(&honest));
    }

    #[test]
    fn delivery_order_does_not_matter() {
        let signers = nodes(4);
        let active: BTreeSet<_> = signers.iter().cloned().collect();
        let obs = observation();
        for order in [[0, 1, 2, 3], [3, 2, 1, 0], [2, 0, 3, 1]] {
            let mut book = VoterBook::new();
            let finalized = order
                .iter()
                .chain(order.iter())
                .filter(|&&i| {
                    matches!(
                        record(&mut book, &obs, &signers[i], &active),
                        VoteOutcome::FirstTimeFinalized(_)
                    )
                })
                .count();
            assert_eq!(finalized, 1);
        }
    }

    #[test]
    fn repeat_vote_finalizes_after_active_set_shrinks() {
        let signers = nodes(4);
        let mut active: BTreeSet<_> = signers.iter().cloned().collect();
        let obs = observation();
        let mut book = VoterBook::new();
        record(&mut book, &obs, &signers[0], &active);
        record(&mut book, &obs, &signers[1], &active);

        active.remove(&signers[2]);
        active.remove(&signers[3]);
        assert_eq!(
            record(&mut book, &obs, &signers[0], &active),
            VoteOutcome::FirstTimeFinalized(obs.clone())
        );
        assert_eq!(record(&mut book, &obs, &signers[1], &active), VoteOutcome::AlreadyFinalized);
        assert_eq!(book.get(&obs.tx.id).unwrap().signers_for(&obs), 2);
    }

    #[test]
    fn inactive_signers_do_not_count() {
        let signers = nodes(4);
        let active: BTreeSet<_> = signers[..3].iter().cloned().collect();
        let obs = observation();
        let mut book = VoterBook::new();
        let outsider = NodeAddress::random();
        record(&mut book, &obs, &outsider, &active);
        record(&mut book, &obs, &signers[0], &active);
        assert_eq!(record(&mut book, &obs, &signers[1], &active), VoteOutcome::Pending);
        assert!(matches!(
            record(&mut book, &obs, &signers[2], &active),
            VoteOutcome::FirstTimeFinalized(_)
        ));
    }

    #[test]
    fn empty_active_set_never_finalizes() {
        let obs = observation();
        let mut book = VoterBook::new();
        let outcome = record(&mut book, &obs, &NodeAddress::random(), &BTreeSet::new());
        assert_eq!(outcome, VoteOutcome::Pending);
    }

    #[test]
    fn mismatched_tx_id_is_an_error() {
        let obs = observation();
        let mut book = VoterBook::new();
        let err = book
            .record(
                &TxId::random(),
                obs,
                NodeAddress::random(),
                &BTreeSet::new(),
                QuorumFraction::two_thirds(),
                1,
            )
            .unwrap_err();
        assert!(matches!(err, TidepoolError::InvalidObservation { .. }));
        assert!(book.is_empty());
    }
}
