//! # State Entries
//!
//! The five entry types held by a snapshot. Every map is a `BTreeMap` so the
//! canonical encoding (and therefore the state digest) is order-independent
//! of insertion history.

use crate::errors::StateError;
use ledger_types::{
    is_reserved_reference, AssetId, Balance, ContractData, ContractFamily, EncumbranceParty,
    PoaItem, TxType,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// ADDRESS
// =============================================================================

/// Per-address account state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub address: String,
    pub public_key: Option<String>,
    /// Next expected nonce.
    pub nonce: u64,
    pub permissions: u64,
    /// Types this address may submit regardless of `permissions`.
    pub allowed_tx_types: BTreeSet<TxType>,
    /// Sparse: a zero balance is never stored.
    pub balances: BTreeMap<String, Balance>,
    pub metadata: String,
    /// Block time of the last transaction this address sent.
    #[serde(default)]
    pub last_active: i64,
}

impl AddressEntry {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into().to_ascii_lowercase(),
            public_key: None,
            nonce: 0,
            permissions: 0,
            allowed_tx_types: BTreeSet::new(),
            balances: BTreeMap::new(),
            metadata: String::new(),
            last_active: 0,
        }
    }

    /// Builder method to set permission bits.
    #[must_use]
    pub fn with_permissions(mut self, permissions: u64) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub fn with_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.public_key = Some(public_key.into());
        self
    }

    /// Builder method to seed a balance.
    #[must_use]
    pub fn with_balance(mut self, asset: &AssetId, amount: Balance) -> Self {
        self.set_balance(asset, amount);
        self
    }

    /// Balance of `asset`; zero when absent.
    pub fn balance(&self, asset: &AssetId) -> Balance {
        self.balances.get(&asset.full_id()).copied().unwrap_or(0)
    }

    pub fn set_balance(&mut self, asset: &AssetId, amount: Balance) {
        if amount == 0 {
            self.balances.remove(&asset.full_id());
        } else {
            self.balances.insert(asset.full_id(), amount);
        }
    }

    /// Add `delta` (possibly negative) and return the new balance.
    pub fn adjust_balance(&mut self, asset: &AssetId, delta: Balance) -> Result<Balance, StateError> {
        let updated = self.balance(asset).checked_add(delta).ok_or_else(|| {
            StateError::BalanceOverflow {
                address: self.address.clone(),
                asset: asset.full_id(),
            }
        })?;
        self.set_balance(asset, updated);
        Ok(updated)
    }

    pub fn has_permission(&self, bit: u64) -> bool {
        self.permissions & bit == bit
    }

    /// Permission bit or explicit allow-list entry.
    pub fn may_submit(&self, tx_type: TxType) -> bool {
        self.has_permission(tx_type.required_permission())
            || self.allowed_tx_types.contains(&tx_type)
    }
}

// =============================================================================
// NAMESPACE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetClass {
    pub metadata: String,
    pub locked: bool,
}

/// A namespace, its owner, and its registered asset classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceEntry {
    pub namespace: String,
    pub owner: String,
    pub metadata: String,
    pub locked: bool,
    pub classes: BTreeMap<String, AssetClass>,
}

impl NamespaceEntry {
    pub fn new(namespace: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            owner: owner.into().to_ascii_lowercase(),
            metadata: String::new(),
            locked: false,
            classes: BTreeMap::new(),
        }
    }

    /// Builder method to register a class.
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.insert(class.into(), AssetClass::default());
        self
    }

    pub fn is_owner(&self, address: &str) -> bool {
        self.owner.eq_ignore_ascii_case(address)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// Whether the namespace or the given class is locked.
    pub fn is_locked(&self, class: &str) -> bool {
        self.locked || self.classes.get(class).map(|c| c.locked).unwrap_or(false)
    }
}

// =============================================================================
// ENCUMBRANCE
// =============================================================================

/// One reference sub-ledger on an (address, asset) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncumbranceDetail {
    pub reference: String,
    pub amount: Balance,
    /// Reserves against issuance rather than current balance.
    pub cumulative: bool,
    pub created_at: i64,
    pub administrators: Vec<EncumbranceParty>,
    pub beneficiaries: Vec<EncumbranceParty>,
}

impl EncumbranceDetail {
    pub fn is_administrator(&self, address: &str, now: i64) -> bool {
        self.administrators.iter().any(|p| p.matches(address, now))
    }

    pub fn is_beneficiary(&self, address: &str, now: i64) -> bool {
        self.beneficiaries.iter().any(|p| p.matches(address, now))
    }

    /// Expired once every administrator window has closed.
    ///
    /// An encumbrance without administrators, or with an open-ended one,
    /// never expires.
    pub fn has_expired(&self, now: i64) -> bool {
        if self.administrators.is_empty() || self.administrators.iter().any(|p| p.end == 0) {
            return false;
        }
        let last = self.administrators.iter().map(|p| p.end).max().unwrap_or(0);
        now > last
    }

    pub fn same_parties(
        &self,
        administrators: &[EncumbranceParty],
        beneficiaries: &[EncumbranceParty],
    ) -> bool {
        self.administrators == administrators && self.beneficiaries == beneficiaries
    }
}

/// All encumbrances held against one address, by asset.
///
/// Position within an asset's list is priority: holding locks sit in front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncumbranceEntry {
    pub address: String,
    pub assets: BTreeMap<String, Vec<EncumbranceDetail>>,
}

impl EncumbranceEntry {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into().to_ascii_lowercase(),
            assets: BTreeMap::new(),
        }
    }

    pub fn details(&self, asset: &AssetId) -> &[EncumbranceDetail] {
        self.assets
            .get(&asset.full_id())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn find(&self, asset: &AssetId, reference: &str) -> Option<&EncumbranceDetail> {
        self.details(asset).iter().find(|d| d.reference == reference)
    }

    pub fn find_mut(&mut self, asset: &AssetId, reference: &str) -> Option<&mut EncumbranceDetail> {
        self.assets
            .get_mut(&asset.full_id())
            .and_then(|list| list.iter_mut().find(|d| d.reference == reference))
    }

    /// Sum of non-cumulative amounts: what the balance must cover.
    pub fn reserved(&self, asset: &AssetId) -> Balance {
        self.details(asset)
            .iter()
            .filter(|d| !d.cumulative)
            .fold(0, |acc, d| acc.saturating_add(d.amount))
    }

    /// Sum of holding locks, which freeze balance without reserving it.
    pub fn locked(&self, asset: &AssetId) -> Balance {
        self.details(asset)
            .iter()
            .filter(|d| is_reserved_reference(&d.reference))
            .fold(0, |acc, d| acc.saturating_add(d.amount))
    }

    /// Append, or insert at the front for high-priority locks.
    pub fn push(&mut self, asset: &AssetId, detail: EncumbranceDetail, front: bool) {
        let list = self.assets.entry(asset.full_id()).or_default();
        if front {
            list.insert(0, detail);
        } else {
            list.push(detail);
        }
    }

    /// Reduce a reference by `amount`, dropping it at zero.
    pub fn reduce(
        &mut self,
        asset: &AssetId,
        reference: &str,
        amount: Balance,
    ) -> Result<(), StateError> {
        let negative = || StateError::NegativeEncumbrance {
            address: self.address.clone(),
            asset: asset.full_id(),
            reference: reference.to_string(),
        };
        let key = asset.full_id();
        let list = self.assets.get_mut(&key).ok_or_else(negative)?;
        let pos = list
            .iter()
            .position(|d| d.reference == reference)
            .ok_or_else(negative)?;
        let remaining = list[pos].amount - amount;
        if remaining < 0 {
            return Err(negative());
        }
        if remaining == 0 {
            list.remove(pos);
        } else {
            list[pos].amount = remaining;
        }
        if list.is_empty() {
            self.assets.remove(&key);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

// =============================================================================
// POWER OF ATTORNEY
// =============================================================================

/// One grant from a principal to an attorney.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoaGrant {
    pub attorney: String,
    pub start: i64,
    pub expiry: i64,
    pub items: Vec<PoaItem>,
}

impl PoaGrant {
    pub fn is_live(&self, now: i64) -> bool {
        self.start <= now && now <= self.expiry
    }
}

/// All grants made by one principal, by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoaEntry {
    pub principal: String,
    pub grants: BTreeMap<String, PoaGrant>,
}

impl PoaEntry {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into().to_ascii_lowercase(),
            grants: BTreeMap::new(),
        }
    }
}

// =============================================================================
// CONTRACT
// =============================================================================

/// Contract lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractStatus {
    /// Created, still collecting signatures or open for commits
    Pending,
    /// Satisfied, waiting for the next event sweep
    AwaitingEvent,
    Completed,
    Cancelled,
}

impl ContractStatus {
    pub fn is_final(self) -> bool {
        matches!(self, ContractStatus::Completed | ContractStatus::Cancelled)
    }
}

/// A stored contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEntry {
    pub address: String,
    pub family: ContractFamily,
    /// The authoring address (the principal under POA).
    pub issuer: String,
    pub data: ContractData,
    pub status: ContractStatus,
    pub created_at: i64,
    pub next_time_event: Option<i64>,
    pub completed_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    /// Last human-readable status reason.
    pub status_note: String,
}

impl ContractEntry {
    pub fn new(
        address: impl Into<String>,
        issuer: impl Into<String>,
        data: ContractData,
        created_at: i64,
    ) -> Self {
        Self {
            address: address.into().to_ascii_lowercase(),
            family: data.family(),
            issuer: issuer.into().to_ascii_lowercase(),
            data,
            status: ContractStatus::Pending,
            created_at,
            next_time_event: None,
            completed_at: None,
            cancelled_at: None,
            status_note: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> AssetId {
        AssetId::new("NS", "C")
    }

    fn detail(reference: &str, amount: Balance, cumulative: bool) -> EncumbranceDetail {
        EncumbranceDetail {
            reference: reference.into(),
            amount,
            cumulative,
            created_at: 0,
            administrators: vec![],
            beneficiaries: vec![],
        }
    }

    // ===== ADDRESS TESTS =====

    #[test]
    fn test_balances_are_sparse() {
        let mut entry = AddressEntry::new("0xAA");
        assert_eq!(entry.address, "0xaa");
        entry.adjust_balance(&asset(), 10).unwrap();
        assert_eq!(entry.balance(&asset()), 10);
        entry.adjust_balance(&asset(), -10).unwrap();
        assert!(entry.balances.is_empty());
        assert_eq!(entry.balance(&AssetId::new("X", "Y")), 0);
    }

    #[test]
    fn test_balance_overflow_is_fatal() {
        let mut entry = AddressEntry::new("0xaa").with_balance(&asset(), Balance::MAX);
        assert!(matches!(
            entry.adjust_balance(&asset(), 1),
            Err(StateError::BalanceOverflow { .. })
        ));
    }

    #[test]
    fn test_may_submit_via_allow_list() {
        let mut entry = AddressEntry::new("0xaa");
        assert!(!entry.may_submit(TxType::TransferAsset));
        entry.allowed_tx_types.insert(TxType::TransferAsset);
        assert!(entry.may_submit(TxType::TransferAsset));
        let entry = AddressEntry::new("0xbb").with_permissions(ledger_types::permissions::ALL);
        assert!(entry.may_submit(TxType::NewContract));
    }

    // ===== NAMESPACE TESTS =====

    #[test]
    fn test_namespace_lock_covers_classes() {
        let mut ns = NamespaceEntry::new("NS", "0xAA").with_class("C");
        assert!(ns.is_owner("0xaa"));
        assert!(!ns.is_locked("C"));
        ns.classes.get_mut("C").unwrap().locked = true;
        assert!(ns.is_locked("C"));
        assert!(!ns.is_locked("D"));
        ns.locked = true;
        assert!(ns.is_locked("D"));
    }

    // ===== ENCUMBRANCE TESTS =====

    #[test]
    fn test_reserved_ignores_cumulative() {
        let mut e = EncumbranceEntry::new("0xaa");
        e.push(&asset(), detail("a", 30, false), false);
        e.push(&asset(), detail("b", 500, true), false);
        e.push(&asset(), detail("lock", 5, false), true);
        assert_eq!(e.reserved(&asset()), 35);
        assert_eq!(e.details(&asset())[0].reference, "lock");
    }

    #[test]
    fn test_reduce_removes_at_zero() {
        let mut e = EncumbranceEntry::new("0xaa");
        e.push(&asset(), detail("a", 30, false), false);
        e.reduce(&asset(), "a", 10).unwrap();
        assert_eq!(e.find(&asset(), "a").unwrap().amount, 20);
        assert!(matches!(
            e.reduce(&asset(), "a", 21),
            Err(StateError::NegativeEncumbrance { .. })
        ));
        e.reduce(&asset(), "a", 20).unwrap();
        assert!(e.is_empty());
    }

    #[test]
    fn test_expiry_follows_administrators() {
        let mut d = detail("a", 1, false);
        assert!(!d.has_expired(i64::MAX));
        d.administrators.push(EncumbranceParty {
            address: "0xaa".into(),
            start: 0,
            end: 100,
        });
        assert!(!d.has_expired(100));
        assert!(d.has_expired(101));
        d.administrators.push(EncumbranceParty::open("0xbb"));
        assert!(!d.has_expired(101));
    }
}
