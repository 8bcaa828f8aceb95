//! Outbound queue: payments staged per processing height.
//!
//! Items wait in their height's batch until the external signer claims the
//! batch. A claimed item leaves the queue but stays *in flight* until its
//! completion is observed, so the orchestrator can check what was paid
//! against what was owed. A key stays reserved while its item is queued or
//! in flight; once completed it is forgotten here and the settled key is
//! held by the [`OutboundGuard`](crate::OutboundGuard) instead.

use std::collections::{BTreeMap, HashMap, HashSet};

use rust_decimal::Decimal;
use tidepool_types::{Amount, Asset, OutboundItem, OutboundKey, PubKey, Result, TidepoolError};

/// Per-height batches of outbound items.
#[derive(Debug, Clone, Default)]
pub struct OutboundQueue {
    /// Staged, unclaimed items by processing height.
    batches: BTreeMap<u64, Vec<OutboundItem>>,
    /// Claimed items awaiting their completion observation.
    in_flight: HashMap<OutboundKey, OutboundItem>,
    /// Keys of every queued or in-flight item.
    outstanding: HashSet<OutboundKey>,
}

impl OutboundQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `item` for signing at `height`.
    ///
    /// # Errors
    /// `DuplicateOutbound` if an item with the same key is still queued
    /// or in flight.
    pub fn stage(&mut self, height: u64, item: OutboundItem) -> Result<()> {
        let key = item.key();
        if self.outstanding.contains(&key) {
            return Err(TidepoolError::DuplicateOutbound {
                in_hash: key.in_hash,
                to_address: key.to_address,
            });
        }
        tracing::debug!(height, %item, "outbound staged");
        self.outstanding.insert(key);
        self.batches.entry(height).or_default().push(item);
        Ok(())
    }

    /// Items staged at `height` and not yet claimed.
    #[must_use]
    pub fn pending(&self, height: u64) -> &[OutboundItem] {
        self.batches.get(&height).map_or(&[], Vec::as_slice)
    }

    /// Hand the batch staged at `height` to the signer.
    ///
    /// Claimed items are removed from the queue and can never be returned
    /// again. Claiming an empty or already claimed height returns nothing.
    pub fn claim_batch(&mut self, height: u64) -> Vec<OutboundItem> {
        let batch = self.batches.remove(&height).unwrap_or_default();
        for item in &batch {
            self.in_flight.insert(item.key(), item.clone());
        }
        if !batch.is_empty() {
            tracing::info!(height, items = batch.len(), "outbound batch claimed");
        }
        batch
    }

    /// Remove the item `key` once its payment is observed, wherever it is.
    ///
    /// Returns the item as it was staged, or `None` if nothing with that
    /// key is outstanding.
    pub fn complete(&mut self, key: &OutboundKey) -> Option<OutboundItem> {
        if !self.outstanding.remove(key) {
            return None;
        }
        if let Some(item) = self.in_flight.remove(key) {
            return Some(item);
        }
        self.batches.values_mut().find_map(|batch| {
            let pos = batch.iter().position(|i| i.key() == *key)?;
            Some(batch.remove(pos))
        })
    }

    /// Whether an item with `key` is queued or in flight.
    #[must_use]
    pub fn is_outstanding(&self, key: &OutboundKey) -> bool {
        self.outstanding.contains(key)
    }

    fn assigned<'a>(&'a self, vault: &'a PubKey) -> impl Iterator<Item = &'a OutboundItem> + 'a {
        self.batches
            .values()
            .flatten()
            .chain(self.in_flight.values())
            .filter(move |i| i.vault_pubkey.as_ref() == Some(vault))
    }

    /// Amount of `asset` that `vault` is already committed to spend on
    /// staged or in-flight items, gas budgets included.
    #[must_use]
    pub fn committed(&self, vault: &PubKey, asset: &Asset) -> Amount {
        self.assigned(vault)
            .fold(Decimal::ZERO, |acc, i| acc + i.spend().amount_of(asset))
    }

    /// Number of staged or in-flight items `vault` is expected to pay.
    #[must_use]
    pub fn assigned_to(&self, vault: &PubKey) -> usize {
        self.assigned(vault).count()
    }

    /// Number of staged, unclaimed items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.values().all(Vec::is_empty)
    }

    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }
}
