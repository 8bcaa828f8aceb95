//! Custody vault types.
//!
//! A vault is identified by its custody public key and holds [`Coins`].
//! Pooled vaults are shared multi-party custody backing the pools; dedicated
//! vaults are single-operator custody used for fast outbound settlement.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Coins, PubKey};

/// Custody model of a vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VaultType {
    /// Shared multi-party custody, key rotated as membership changes.
    Pooled,
    /// Single-operator custody, addressed by the operator's key.
    Dedicated,
}

impl fmt::Display for VaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pooled => write!(f, "POOLED"),
            Self::Dedicated => write!(f, "DEDICATED"),
        }
    }
}

/// Lifecycle status of a vault.
///
/// Transitions are monotonic: `Active → Retiring → Inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VaultStatus {
    Active,
    Retiring,
    Inactive,
}

impl VaultStatus {
    /// Can this status transition to the given target status?
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Active, Self::Retiring) | (Self::Retiring, Self::Inactive)
        )
    }
}

impl fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Retiring => write!(f, "RETIRING"),
            Self::Inactive => write!(f, "INACTIVE"),
        }
    }
}

/// A custody vault and the coins it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub pubkey: PubKey,
    pub vault_type: VaultType,
    pub status: VaultStatus,
    /// Processing height at which the vault was created.
    pub block_height: u64,
    pub coins: Coins,
}

impl Vault {
    #[must_use]
    pub fn new(block_height: u64, status: VaultStatus, vault_type: VaultType, pubkey: PubKey) -> Self {
        Self {
            pubkey,
            vault_type,
            status,
            block_height,
            coins: Coins::new(),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == VaultStatus::Active
    }

    /// Whether the vault holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_are_monotonic() {
        assert!(VaultStatus::Active.can_transition_to(VaultStatus::Retiring));
        assert!(VaultStatus::Retiring.can_transition_to(VaultStatus::Inactive));
        assert!(!VaultStatus::Active.can_transition_to(VaultStatus::Inactive));
        assert!(!VaultStatus::Inactive.can_transition_to(VaultStatus::Active));
        assert!(!VaultStatus::Retiring.can_transition_to(VaultStatus::Active));
    }

    #[test]
    fn new_vault_is_empty() {
        let v = Vault::new(7, VaultStatus::Active, VaultType::Dedicated, PubKey::random());
        assert!(v.is_empty());
        assert!(v.is_active());
        assert_eq!(v.block_height, 7);
    }

    #[test]
    fn vault_serde_roundtrip() {
        let v = Vault::new(1, VaultStatus::Retiring, VaultType::Pooled, PubKey::random());
        let json = serde_json::to_string(&v).unwrap();
        let back: Vault = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
