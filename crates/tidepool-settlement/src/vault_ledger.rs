//! Vault ledger: authoritative custody balances per vault.
//!
//! Debits check availability before touching anything, so a failed debit
//! leaves the vault exactly as it was. No vault ever holds a negative
//! amount of any asset.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tidepool_types::{
    Amount, Asset, Coin, Coins, PubKey, Result, TidepoolError, Vault, VaultStatus, VaultType,
};

/// All vaults, keyed by custody public key.
#[derive(Debug, Clone, Default)]
pub struct VaultLedger {
    vaults: BTreeMap<PubKey, Vault>,
}

impl VaultLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a vault record.
    pub fn set_vault(&mut self, vault: Vault) {
        tracing::debug!(vault = %vault.pubkey.short(), kind = %vault.vault_type, status = %vault.status, "vault stored");
        self.vaults.insert(vault.pubkey.clone(), vault);
    }

    #[must_use]
    pub fn get(&self, pubkey: &PubKey) -> Option<&Vault> {
        self.vaults.get(pubkey)
    }

    #[must_use]
    pub fn exists(&self, pubkey: &PubKey) -> bool {
        self.vaults.contains_key(pubkey)
    }

    /// Remove a vault. Removing an unknown key is a no-op.
    pub fn delete(&mut self, pubkey: &PubKey) {
        if self.vaults.remove(pubkey).is_some() {
            tracing::info!(vault = %pubkey.short(), "vault deleted");
        }
    }

    pub fn vaults(&self) -> impl Iterator<Item = &Vault> {
        self.vaults.values()
    }

    /// Active vaults of one custody type.
    pub fn list_active(&self, vault_type: VaultType) -> impl Iterator<Item = &Vault> {
        self.vaults
            .values()
            .filter(move |v| v.vault_type == vault_type && v.is_active())
    }

    /// Amount of `asset` held by `pubkey`, zero if the vault is unknown.
    #[must_use]
    pub fn balance(&self, pubkey: &PubKey, asset: &Asset) -> Amount {
        self.vaults
            .get(pubkey)
            .map_or(Decimal::ZERO, |v| v.coins.amount_of(asset))
    }

    /// Amount of `asset` held across every vault.
    #[must_use]
    pub fn total(&self, asset: &Asset) -> Amount {
        self.vaults.values().map(|v| v.coins.amount_of(asset)).sum()
    }

    // -----------------------------------------------------------------
    // Balance changes
    // -----------------------------------------------------------------

    /// Add `coin` to the vault.
    ///
    /// # Errors
    /// `VaultNotFound` if no vault has this key.
    pub fn credit(&mut self, pubkey: &PubKey, coin: &Coin) -> Result<()> {
        let vault = self.vault_mut(pubkey)?;
        vault.coins.add(coin);
        Ok(())
    }

    /// Add every coin of `coins` to the vault.
    pub fn credit_all(&mut self, pubkey: &PubKey, coins: &Coins) -> Result<()> {
        let vault = self.vault_mut(pubkey)?;
        vault.coins.add_all(coins);
        Ok(())
    }

    /// Remove `coin` from the vault.
    ///
    /// # Errors
    /// - `VaultNotFound` if no vault has this key
    /// - `InsufficientFunds` if the vault holds less than `coin.amount`;
    ///   the vault is unchanged
    pub fn debit(&mut self, pubkey: &PubKey, coin: &Coin) -> Result<()> {
        let vault = self.vault_mut(pubkey)?;
        vault
            .coins
            .try_sub(coin)
            .map_err(|available| TidepoolError::InsufficientFunds {
                vault: pubkey.clone(),
                asset: coin.asset.clone(),
                needed: coin.amount,
                available,
            })
    }

    /// Remove every coin of `coins`, all or nothing.
    pub fn debit_all(&mut self, pubkey: &PubKey, coins: &Coins) -> Result<()> {
        let vault = self.vault_mut(pubkey)?;
        let mut remaining = vault.coins.clone();
        for coin in coins.iter() {
            remaining
                .try_sub(&coin)
                .map_err(|available| TidepoolError::InsufficientFunds {
                    vault: pubkey.clone(),
                    asset: coin.asset.clone(),
                    needed: coin.amount,
                    available,
                })?;
        }
        vault.coins = remaining;
        Ok(())
    }

    fn vault_mut(&mut self, pubkey: &PubKey) -> Result<&mut Vault> {
        self.vaults
            .get_mut(pubkey)
            .ok_or_else(|| TidepoolError::VaultNotFound(pubkey.clone()))
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Move an active vault to `Retiring`.
    pub fn retire(&mut self, pubkey: &PubKey) -> Result<()> {
        self.transition(pubkey, VaultStatus::Retiring)
    }

    /// Move a retiring vault to `Inactive`. The vault must be empty.
    pub fn deactivate(&mut self, pubkey: &PubKey) -> Result<()> {
        let vault = self.vault_mut(pubkey)?;
        if !vault.is_empty() {
            return Err(TidepoolError::SettlementFailed {
                reason: format!("vault {} still holds {}", pubkey.short(), vault.coins),
            });
        }
        self.transition(pubkey, VaultStatus::Inactive)
    }

    fn transition(&mut self, pubkey: &PubKey, to: VaultStatus) -> Result<()> {
        let vault = self.vault_mut(pubkey)?;
        if !vault.status.can_transition_to(to) {
            return Err(TidepoolError::InvalidVaultTransition {
                from: vault.status,
                to,
            });
        }
        tracing::info!(vault = %pubkey.short(), from = %vault.status, %to, "vault status changed");
        vault.status = to;
        Ok(())
    }

    /// Move every coin from a retiring vault into an active one. Reached
    /// through [`LedgerState::migrate_vault`](crate::LedgerState::migrate_vault),
    /// which first checks the vault owes no outbound items.
    ///
    /// # Errors
    /// - `VaultNotFound` for either key
    /// - `SettlementFailed` if `from` is not retiring, `to` is not active,
    ///   or both keys are the same
    pub(crate) fn migrate(&mut self, from: &PubKey, to: &PubKey) -> Result<Coins> {
        if from == to {
            return Err(TidepoolError::SettlementFailed {
                reason: "cannot migrate a vault into itself".to_string(),
            });
        }
        let source = self
            .vaults
            .get(from)
            .ok_or_else(|| TidepoolError::VaultNotFound(from.clone()))?;
        let target = self
            .vaults
            .get(to)
            .ok_or_else(|| TidepoolError::VaultNotFound(to.clone()))?;
        if source.status != VaultStatus::Retiring || !target.is_active() {
            return Err(TidepoolError::SettlementFailed {
                reason: format!(
                    "migration needs a retiring source and an active target, got {} -> {}",
                    source.status, target.status
                ),
            });
        }

        let moved = source.coins.clone();
        self.vault_mut(from)?.coins = Coins::new();
        self.vault_mut(to)?.coins.add_all(&moved);
        tracing::info!(from = %from.short(), to = %to.short(), coins = %moved, "vault migrated");
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rune() -> Asset {
        "BNB.RUNE-A1F".parse().unwrap()
    }

    fn ledger_with(vault_type: VaultType) -> (VaultLedger, PubKey) {
        let mut ledger = VaultLedger::new();
        let pk = PubKey::random();
        ledger.set_vault(Vault::new(1, VaultStatus::Active, vault_type, pk.clone()));
        (ledger, pk)
    }

    #[test]
    fn credit_then_debit() {
        let (mut ledger, pk) = ledger_with(VaultType::Pooled);
        ledger.credit(&pk, &Coin::new(rune(), Decimal::from(500))).unwrap();
        ledger.debit(&pk, &Coin::new(rune(), Decimal::from(200))).unwrap();
        assert_eq!(ledger.balance(&pk, &rune()), Decimal::from(300));
    }

    #[test]
    fn over_debit_leaves_balance_unchanged() {
        let (mut ledger, pk) = ledger_with(VaultType::Pooled);
        ledger.credit(&pk, &Coin::new(rune(), Decimal::from(100))).unwrap();
        let err = ledger.debit(&pk, &Coin::new(rune(), Decimal::from(150))).unwrap_err();
        assert!(matches!(
            err,
            TidepoolError::InsufficientFunds { needed, available, .. }
                if needed == Decimal::from(150) && available == Decimal::from(100)
        ));
        assert_eq!(ledger.balance(&pk, &rune()), Decimal::from(100));
    }

    #[test]
    fn debit_all_is_all_or_nothing() {
        let (mut ledger, pk) = ledger_with(VaultType::Pooled);
        ledger.credit(&pk, &Coin::new(rune(), Decimal::from(100))).unwrap();
        ledger.credit(&pk, &Coin::new(Asset::bnb(), Decimal::from(5))).unwrap();
        let coins: Coins = vec![
            Coin::new(rune(), Decimal::from(50)),
            Coin::new(Asset::bnb(), Decimal::from(6)),
        ]
        .into_iter()
        .collect();
        assert!(ledger.debit_all(&pk, &coins).is_err());
        assert_eq!(ledger.balance(&pk, &rune()), Decimal::from(100));
        assert_eq!(ledger.balance(&pk, &Asset::bnb()), Decimal::from(5));
    }

    #[test]
    fn unknown_vault() {
        let mut ledger = VaultLedger::new();
        let pk = PubKey::random();
        assert!(!ledger.exists(&pk));
        let err = ledger.credit(&pk, &Coin::new(rune(), Decimal::ONE)).unwrap_err();
        assert!(matches!(err, TidepoolError::VaultNotFound(_)));
        // Deleting twice is fine.
        ledger.delete(&pk);
        ledger.delete(&pk);
    }

    #[test]
    fn list_active_filters_type_and_status() {
        let (mut ledger, pooled) = ledger_with(VaultType::Pooled);
        let dedicated = PubKey::random();
        ledger.set_vault(Vault::new(1, VaultStatus::Active, VaultType::Dedicated, dedicated.clone()));
        assert_eq!(ledger.list_active(VaultType::Pooled).count(), 1);
        assert_eq!(ledger.list_active(VaultType::Dedicated).count(), 1);

        ledger.retire(&pooled).unwrap();
        assert_eq!(ledger.list_active(VaultType::Pooled).count(), 0);
    }

    #[test]
    fn lifecycle_is_monotonic() {
        let (mut ledger, pk) = ledger_with(VaultType::Pooled);
        assert!(matches!(
            ledger.deactivate(&pk).unwrap_err(),
            TidepoolError::InvalidVaultTransition { .. }
        ));
        ledger.retire(&pk).unwrap();
        assert!(ledger.retire(&pk).is_err());
        ledger.deactivate(&pk).unwrap();
        assert_eq!(ledger.get(&pk).unwrap().status, VaultStatus::Inactive);
    }

    #[test]
    fn migrate_moves_everything() {
        let (mut ledger, old) = ledger_with(VaultType::Pooled);
        let new = PubKey::random();
        ledger.set_vault(Vault::new(2, VaultStatus::Active, VaultType::Pooled, new.clone()));
        ledger.credit(&old, &Coin::new(rune(), Decimal::from(70))).unwrap();

        // Source must be retiring first.
        assert!(ledger.migrate(&old, &new).is_err());
        assert_eq!(ledger.balance(&old, &rune()), Decimal::from(70));

        ledger.retire(&old).unwrap();
        let moved = ledger.migrate(&old, &new).unwrap();
        assert_eq!(moved.amount_of(&rune()), Decimal::from(70));
        assert!(ledger.get(&old).unwrap().is_empty());
        assert_eq!(ledger.balance(&new, &rune()), Decimal::from(70));
        assert_eq!(ledger.total(&rune()), Decimal::from(70));

        ledger.deactivate(&old).unwrap();
    }
}
