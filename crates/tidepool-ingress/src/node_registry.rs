//! Node membership as seen by the settlement core.
//!
//! Membership and bonding policy belong to an external collaborator. The
//! core only consumes the active set, the quorum fraction, the mapping from
//! custody keys to operators, and a way to charge an operator's bond.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use tidepool_types::{Amount, NodeAddress, PubKey, QuorumFraction};

/// Membership collaborator interface.
pub trait NodeRegistry {
    /// Nodes currently allowed to take part in consensus.
    fn active_nodes(&self) -> BTreeSet<NodeAddress>;

    /// Fraction of the active set a variant must exceed to finalize.
    fn quorum(&self) -> QuorumFraction;

    /// Whether `node` may submit observations.
    fn is_authorized_observer(&self, node: &NodeAddress) -> bool;

    /// Operator whose custody key is `pubkey`, if any.
    fn operator_of(&self, pubkey: &PubKey) -> Option<NodeAddress>;

    /// Charge up to `amount` against `node`'s bond. Returns what was
    /// actually taken, which is capped at the posted bond.
    fn slash_bond(&mut self, node: &NodeAddress, amount: Amount) -> Amount;
}

/// Membership status of a node account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Active,
    Standby,
    Disabled,
}

/// One validator's account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAccount {
    pub address: NodeAddress,
    pub status: NodeStatus,
    /// Custody key the node signs outbound transactions with.
    pub pubkey: PubKey,
    /// Posted collateral in base-asset units.
    pub bond: Amount,
    /// Whether the node runs an observer.
    pub observer: bool,
}

impl NodeAccount {
    #[must_use]
    pub fn new(address: NodeAddress, pubkey: PubKey, bond: Amount) -> Self {
        Self {
            address,
            status: NodeStatus::Active,
            pubkey,
            bond,
            observer: true,
        }
    }
}

/// In-memory [`NodeRegistry`].
pub struct NodeAccounts {
    accounts: BTreeMap<NodeAddress, NodeAccount>,
    quorum: QuorumFraction,
}

impl NodeAccounts {
    #[must_use]
    pub fn new(quorum: QuorumFraction) -> Self {
        Self {
            accounts: BTreeMap::new(),
            quorum,
        }
    }

    /// Add or replace an account.
    pub fn upsert(&mut self, account: NodeAccount) {
        self.accounts.insert(account.address.clone(), account);
    }

    pub fn set_status(&mut self, node: &NodeAddress, status: NodeStatus) {
        if let Some(account) = self.accounts.get_mut(node) {
            account.status = status;
        }
    }

    #[must_use]
    pub fn get(&self, node: &NodeAddress) -> Option<&NodeAccount> {
        self.accounts.get(node)
    }

    /// Posted bond of `node`, zero if unknown.
    #[must_use]
    pub fn bond_of(&self, node: &NodeAddress) -> Amount {
        self.accounts.get(node).map_or(Decimal::ZERO, |a| a.bond)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl Default for NodeAccounts {
    fn default() -> Self {
        Self::new(QuorumFraction::default())
    }
}

impl NodeRegistry for NodeAccounts {
    fn active_nodes(&self) -> BTreeSet<NodeAddress> {
        self.accounts
            .values()
            .filter(|a| a.status == NodeStatus::Active)
            .map(|a| a.address.clone())
            .collect()
    }

    fn quorum(&self) -> QuorumFraction {
        self.quorum
    }

    fn is_authorized_observer(&self, node: &NodeAddress) -> bool {
        self.accounts
            .get(node)
            .is_some_and(|a| a.status == NodeStatus::Active && a.observer)
    }

    fn operator_of(&self, pubkey: &PubKey) -> Option<NodeAddress> {
        self.accounts
            .values()
            .find(|a| a.pubkey == *pubkey)
            .map(|a| a.address.clone())
    }

    fn slash_bond(&mut self, node: &NodeAddress, amount: Amount) -> Amount {
        let Some(account) = self.accounts.get_mut(node) else {
            return Decimal::ZERO;
        };
        let taken = amount.max(Decimal::ZERO).min(account.bond);
        account.bond -= taken;
        taken
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl NodeAccounts {
    /// `n` active observer nodes, each with a random key and `bond`.
    pub fn with_random_nodes(n: usize, bond: Amount, quorum: QuorumFraction) -> Self {
        let mut accounts = Self::new(quorum);
        for _ in 0..n {
            accounts.upsert(NodeAccount::new(NodeAddress::random(), PubKey::random(), bond));
        }
        accounts
    }
}
