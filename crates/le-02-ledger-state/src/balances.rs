//! Balance arithmetic shared by every rule that moves assets.
//!
//! Spendable balance is `balance − Σ non-cumulative encumbrances − Σ holding
//! locks`. Holding locks are cumulative and may exceed the balance. Namespace
//! owners are issuers: their balance may go negative, so they bypass the
//! spendable check.

use crate::entries::{AddressEntry, EncumbranceEntry};
use crate::errors::{RuleError, RuleResult, StateError};
use crate::snapshot::StateSnapshot;
use ledger_types::{AssetId, Balance};

impl<'p> StateSnapshot<'p> {
    /// Balance of `asset` held by `address`; zero for unknown addresses.
    pub fn balance_of(&self, address: &str, asset: &AssetId) -> Balance {
        self.address(address).map(|e| e.balance(asset)).unwrap_or(0)
    }

    /// Amount of `asset` reserved by non-cumulative encumbrances.
    pub fn reserved_of(&self, address: &str, asset: &AssetId) -> Balance {
        self.encumbrances(address)
            .map(|e| e.reserved(asset))
            .unwrap_or(0)
    }

    /// Amount of `asset` frozen by holding locks.
    pub fn locked_of(&self, address: &str, asset: &AssetId) -> Balance {
        self.encumbrances(address)
            .map(|e| e.locked(asset))
            .unwrap_or(0)
    }

    /// Balance neither reserved by a non-cumulative encumbrance nor locked.
    pub fn spendable(&self, address: &str, asset: &AssetId) -> Balance {
        self.balance_of(address, asset)
            .saturating_sub(self.reserved_of(address, asset))
            .saturating_sub(self.locked_of(address, asset))
    }

    /// Whether `address` owns the namespace of `asset`.
    pub fn is_issuer(&self, address: &str, asset: &AssetId) -> bool {
        self.namespace(&asset.namespace)
            .map(|ns| ns.is_owner(address))
            .unwrap_or(false)
    }

    /// Reject unless `address` can pay `amount` from free balance.
    pub fn require_spendable(
        &self,
        address: &str,
        asset: &AssetId,
        amount: Balance,
    ) -> RuleResult<()> {
        if self.is_issuer(address, asset) {
            return Ok(());
        }
        let spendable = self.spendable(address, asset);
        if spendable < amount {
            return Err(RuleError::precondition(format!(
                "Insufficient balance of {asset} at {address}: spendable {spendable}, required {amount}"
            )));
        }
        Ok(())
    }

    /// Reject when `address` may not receive a credit under current policy.
    pub fn require_creditable(&self, address: &str) -> RuleResult<()> {
        if !self.exists::<AddressEntry>(address) && self.config().must_register_addresses {
            return Err(RuleError::precondition(format!(
                "Address {address} is not registered"
            )));
        }
        Ok(())
    }

    /// Credit `amount`, creating the address entry unless registration is
    /// mandatory.
    pub fn credit(&mut self, address: &str, asset: &AssetId, amount: Balance) -> RuleResult<()> {
        self.require_creditable(address)?;
        let entry = self.find_or_create::<AddressEntry>(address, || AddressEntry::new(address))?;
        entry.adjust_balance(asset, amount)?;
        Ok(())
    }

    /// Debit `amount` without checking availability.
    pub fn debit(&mut self, address: &str, asset: &AssetId, amount: Balance) -> RuleResult<()> {
        let entry = self
            .find_and_mark_updated::<AddressEntry>(address)
            .ok_or_else(|| RuleError::precondition(format!("Unknown address {address}")))?;
        let negated = amount.checked_neg().ok_or_else(|| StateError::BalanceOverflow {
            address: address.to_string(),
            asset: asset.full_id(),
        })?;
        entry.adjust_balance(asset, negated)?;
        Ok(())
    }

    /// Move `amount` between two addresses.
    pub fn move_asset(
        &mut self,
        from: &str,
        to: &str,
        asset: &AssetId,
        amount: Balance,
    ) -> RuleResult<()> {
        self.require_creditable(to)?;
        self.debit(from, asset, amount)?;
        self.credit(to, asset, amount)
    }

    /// The encumbrance entry of `address`, created on first use.
    pub fn encumbrances_mut(&mut self, address: &str) -> Result<&mut EncumbranceEntry, StateError> {
        self.find_or_create::<EncumbranceEntry>(address, || EncumbranceEntry::new(address))
    }

    /// Drop an encumbrance entry that no longer holds any reference.
    pub fn tidy_encumbrances(&mut self, address: &str) -> Result<(), StateError> {
        let empty = self
            .encumbrances(address)
            .map(EncumbranceEntry::is_empty)
            .unwrap_or(false);
        if empty {
            self.delete::<EncumbranceEntry>(address)?;
        }
        Ok(())
    }
}
