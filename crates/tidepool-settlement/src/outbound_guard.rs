//! Outbound settlement guard: each staged payment settles at most once.
//!
//! A completion observation that claims to pay an item already settled is
//! a second payment, not a replay. The guard remembers settled keys in a
//! bounded cache so memory stays predictable in long-running nodes.

use std::collections::{HashSet, VecDeque};

use tidepool_types::{OutboundKey, Result, TidepoolError};

/// Bounded set of settled outbound keys with oldest-first eviction.
#[derive(Debug, Clone)]
pub struct OutboundGuard {
    settled: HashSet<OutboundKey>,
    /// Insertion order for eviction (front = oldest).
    order: VecDeque<OutboundKey>,
    max_size: usize,
}

impl OutboundGuard {
    /// Create a guard remembering up to `max_size` keys. A zero size is
    /// raised to one.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            settled: HashSet::new(),
            order: VecDeque::new(),
            max_size,
        }
    }

    /// Mark `key` settled.
    ///
    /// # Errors
    /// [`TidepoolError::OutboundAlreadySettled`] if the key is already settled.
    pub fn mark_settled(&mut self, key: OutboundKey) -> Result<()> {
        if self.settled.contains(&key) {
            return Err(TidepoolError::OutboundAlreadySettled(key.in_hash));
        }

        if self.settled.len() >= self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.settled.remove(&oldest);
            }
        }

        self.settled.insert(key.clone());
        self.order.push_back(key);
        Ok(())
    }

    #[must_use]
    pub fn is_settled(&self, key: &OutboundKey) -> bool {
        self.settled.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.settled.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.settled.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tidepool_types::{Address, Asset, TxId};

    use super::*;

    fn key() -> OutboundKey {
        OutboundKey {
            in_hash: TxId::random(),
            to_address: Address::random(),
            asset: Asset::bnb(),
        }
    }

    #[test]
    fn double_settle_blocked() {
        let mut guard = OutboundGuard::new(100);
        let k = key();
        guard.mark_settled(k.clone()).unwrap();
        assert!(guard.is_settled(&k));

        let err = guard.mark_settled(k.clone()).unwrap_err();
        assert!(
            matches!(&err, TidepoolError::OutboundAlreadySettled(id) if *id == k.in_hash),
            "expected OutboundAlreadySettled, got: {err:?}"
        );
    }

    #[test]
    fn evicts_oldest() {
        let mut guard = OutboundGuard::new(2);
        let (k1, k2, k3) = (key(), key(), key());
        guard.mark_settled(k1.clone()).unwrap();
        guard.mark_settled(k2.clone()).unwrap();
        guard.mark_settled(k3.clone()).unwrap();
        assert_eq!(guard.len(), 2);
        assert!(!guard.is_settled(&k1));
        assert!(guard.is_settled(&k2));
        assert!(guard.is_settled(&k3));
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut guard = OutboundGuard::new(0);
        assert!(guard.is_empty());
        guard.mark_settled(key()).unwrap();
        guard.mark_settled(key()).unwrap();
        assert_eq!(guard.len(), 1);
    }
}
