//! # Entry Sets
//!
//! A sparse overlay of one entry type, keyed by string. A slot is either a
//! live entry written at this level or a tombstone hiding the parent's entry.

use crate::entries::{AddressEntry, ContractEntry, EncumbranceEntry, NamespaceEntry, PoaEntry};
use serde::Serialize;
use std::collections::BTreeMap;

/// One key's state in an overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<E> {
    /// Written at this level. `version` counts the levels that rewrote it.
    Live { entry: E, version: u64 },
    Removed,
}

impl<E> Slot<E> {
    pub fn entry(&self) -> Option<&E> {
        match self {
            Slot::Live { entry, .. } => Some(entry),
            Slot::Removed => None,
        }
    }
}

/// Overlay of one entry type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySet<E> {
    pub(crate) slots: BTreeMap<String, Slot<E>>,
}

impl<E> Default for EntrySet<E> {
    fn default() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }
}

impl<E> EntrySet<E> {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, key: &str) -> Option<&Slot<E>> {
        self.slots.get(key)
    }

    /// Fold a child's overlay into this one.
    ///
    /// A root level has nothing below it to hide, so tombstones are dropped
    /// there instead of stored.
    pub(crate) fn absorb(&mut self, child: EntrySet<E>, is_root: bool) {
        for (key, slot) in child.slots {
            match slot {
                Slot::Removed if is_root => {
                    self.slots.remove(&key);
                }
                other => {
                    self.slots.insert(key, other);
                }
            }
        }
    }
}

/// The five overlays held by one snapshot level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlay {
    pub addresses: EntrySet<AddressEntry>,
    pub namespaces: EntrySet<NamespaceEntry>,
    pub encumbrances: EntrySet<EncumbranceEntry>,
    pub poas: EntrySet<PoaEntry>,
    pub contracts: EntrySet<ContractEntry>,
}

impl Overlay {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
            && self.namespaces.is_empty()
            && self.encumbrances.is_empty()
            && self.poas.is_empty()
            && self.contracts.is_empty()
    }

    pub(crate) fn absorb(&mut self, child: Overlay, is_root: bool) {
        self.addresses.absorb(child.addresses, is_root);
        self.namespaces.absorb(child.namespaces, is_root);
        self.encumbrances.absorb(child.encumbrances, is_root);
        self.poas.absorb(child.poas, is_root);
        self.contracts.absorb(child.contracts, is_root);
    }
}

/// Static routing from an entry type to its overlay.
pub trait EntryKind: Clone + Serialize + Sized {
    /// Entry-set name, for errors and logs.
    const SET: &'static str;

    /// The key this entry is stored under.
    fn key(&self) -> String;

    /// Normalise a lookup key. Address-keyed sets are case-insensitive.
    fn canonical_key(key: &str) -> String {
        key.to_string()
    }

    fn set(overlay: &Overlay) -> &EntrySet<Self>;
    fn set_mut(overlay: &mut Overlay) -> &mut EntrySet<Self>;
}

impl EntryKind for AddressEntry {
    const SET: &'static str = "addresses";

    fn key(&self) -> String {
        self.address.to_ascii_lowercase()
    }

    fn canonical_key(key: &str) -> String {
        key.to_ascii_lowercase()
    }

    fn set(overlay: &Overlay) -> &EntrySet<Self> {
        &overlay.addresses
    }

    fn set_mut(overlay: &mut Overlay) -> &mut EntrySet<Self> {
        &mut overlay.addresses
    }
}

impl EntryKind for NamespaceEntry {
    const SET: &'static str = "namespaces";

    fn key(&self) -> String {
        self.namespace.clone()
    }

    fn set(overlay: &Overlay) -> &EntrySet<Self> {
        &overlay.namespaces
    }

    fn set_mut(overlay: &mut Overlay) -> &mut EntrySet<Self> {
        &mut overlay.namespaces
    }
}

impl EntryKind for EncumbranceEntry {
    const SET: &'static str = "encumbrances";

    fn key(&self) -> String {
        self.address.to_ascii_lowercase()
    }

    fn canonical_key(key: &str) -> String {
        key.to_ascii_lowercase()
    }

    fn set(overlay: &Overlay) -> &EntrySet<Self> {
        &overlay.encumbrances
    }

    fn set_mut(overlay: &mut Overlay) -> &mut EntrySet<Self> {
        &mut overlay.encumbrances
    }
}

impl EntryKind for PoaEntry {
    const SET: &'static str = "poas";

    fn key(&self) -> String {
        self.principal.to_ascii_lowercase()
    }

    fn canonical_key(key: &str) -> String {
        key.to_ascii_lowercase()
    }

    fn set(overlay: &Overlay) -> &EntrySet<Self> {
        &overlay.poas
    }

    fn set_mut(overlay: &mut Overlay) -> &mut EntrySet<Self> {
        &mut overlay.poas
    }
}

impl EntryKind for ContractEntry {
    const SET: &'static str = "contracts";

    fn key(&self) -> String {
        self.address.to_ascii_lowercase()
    }

    fn canonical_key(key: &str) -> String {
        key.to_ascii_lowercase()
    }

    fn set(overlay: &Overlay) -> &EntrySet<Self> {
        &overlay.contracts
    }

    fn set_mut(overlay: &mut Overlay) -> &mut EntrySet<Self> {
        &mut overlay.contracts
    }
}
