//! # Snapshots
//!
//! `StateSnapshot` is one level of the copy-on-write chain. A child borrows
//! its parent immutably, so any number of readers may share a committed
//! parent while a child is being built. Committing is a two-step move:
//! `child.into_changes()` releases the borrow, then `parent.merge(changes)`
//! folds the overlay in. A snapshot can therefore be committed at most once.
//!
//! Besides entries, each level carries:
//!
//! - the effective-transaction list (what actually changed state), and
//! - the contract event queue consumed by the post-processing sweep.

use crate::config::StateConfig;
use crate::entries::{AddressEntry, ContractEntry, EncumbranceEntry, NamespaceEntry, PoaEntry};
use crate::entry_set::{EntryKind, Overlay, Slot};
use crate::errors::StateError;
use ledger_types::{codec, AssetId, Balance, Hash, TxType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};

// =============================================================================
// EFFECTIVE TRANSACTIONS & EVENTS
// =============================================================================

/// A state change the caller should know about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveTx {
    /// An accepted transaction.
    Applied { hash: String, tx_type: TxType },
    /// One asset movement made by contract settlement.
    Settlement {
        contract: String,
        from: String,
        to: String,
        asset: AssetId,
        amount: Balance,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Scheduled at the given time.
    Time(i64),
    /// Raised when a commit satisfied the contract.
    Commit,
}

/// A deferred trigger for one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEvent {
    pub contract: String,
    pub kind: EventKind,
}

impl ContractEvent {
    pub fn commit(contract: impl Into<String>) -> Self {
        Self {
            contract: contract.into().to_ascii_lowercase(),
            kind: EventKind::Commit,
        }
    }

    pub fn time(contract: impl Into<String>, at: i64) -> Self {
        Self {
            contract: contract.into().to_ascii_lowercase(),
            kind: EventKind::Time(at),
        }
    }
}

/// Event queue of one level.
///
/// The visible queue is the parent's visible queue minus its first
/// `consumed_from_parent` events, followed by `own`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct EventQueue {
    consumed_from_parent: usize,
    own: Vec<ContractEvent>,
}

/// Everything a child level changed, detached from its parent borrow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotChanges {
    overlay: Overlay,
    effective: Vec<EffectiveTx>,
    events: EventQueue,
    corrupted: bool,
}

impl SnapshotChanges {
    /// True when merging would change nothing.
    pub fn is_empty(&self) -> bool {
        self.overlay.is_empty()
            && self.effective.is_empty()
            && self.events.own.is_empty()
            && self.events.consumed_from_parent == 0
    }

    pub fn effective_transactions(&self) -> &[EffectiveTx] {
        &self.effective
    }
}

// =============================================================================
// STATE SNAPSHOT
// =============================================================================

/// One level of ledger state.
#[derive(Debug)]
pub struct StateSnapshot<'p> {
    parent: Option<&'p StateSnapshot<'p>>,
    config: Arc<StateConfig>,
    depth: u32,
    overlay: Overlay,
    effective: Vec<EffectiveTx>,
    events: EventQueue,
    corrupted: bool,
}

/// Serialized form hashed by [`StateSnapshot::digest`].
#[derive(Serialize)]
struct DigestView<'a> {
    addresses: Vec<&'a AddressEntry>,
    namespaces: Vec<&'a NamespaceEntry>,
    encumbrances: Vec<&'a EncumbranceEntry>,
    poas: Vec<&'a PoaEntry>,
    contracts: Vec<&'a ContractEntry>,
    effective: &'a [EffectiveTx],
    events: Vec<&'a ContractEvent>,
}

impl StateSnapshot<'static> {
    /// A parentless level: the committed root.
    pub fn root(config: Arc<StateConfig>) -> Self {
        Self {
            parent: None,
            config,
            depth: 0,
            overlay: Overlay::default(),
            effective: Vec::new(),
            events: EventQueue::default(),
            corrupted: false,
        }
    }
}

impl<'p> StateSnapshot<'p> {
    /// A child whose reads fall through to `self`.
    pub fn create_snapshot(&self) -> StateSnapshot<'_> {
        StateSnapshot {
            parent: Some(self),
            config: Arc::clone(&self.config),
            depth: self.depth + 1,
            overlay: Overlay::default(),
            effective: Vec::new(),
            events: EventQueue::default(),
            corrupted: self.corrupted,
        }
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    pub fn shared_config(&self) -> Arc<StateConfig> {
        Arc::clone(&self.config)
    }

    /// Nesting depth; the root is 0.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    /// Flag a fatal fault. A corrupted level refuses to merge.
    pub fn mark_corrupted(&mut self, cause: &StateError) {
        error!(depth = self.depth, error = %cause, "snapshot marked corrupted");
        self.corrupted = true;
    }

    // =========================================================================
    // READS
    // =========================================================================

    fn lookup<E: EntryKind>(&self, key: &str) -> Option<(&E, u64)> {
        match E::set(&self.overlay).slots.get(key) {
            Some(Slot::Live { entry, version }) => Some((entry, *version)),
            Some(Slot::Removed) => None,
            None => self.parent.and_then(|p| p.lookup::<E>(key)),
        }
    }

    /// Read-only view of an entry.
    pub fn find<E: EntryKind>(&self, key: &str) -> Option<&E> {
        self.lookup::<E>(&E::canonical_key(key)).map(|(e, _)| e)
    }

    pub fn exists<E: EntryKind>(&self, key: &str) -> bool {
        self.find::<E>(key).is_some()
    }

    /// How many levels have rewritten this entry.
    pub fn version_of<E: EntryKind>(&self, key: &str) -> Option<u64> {
        self.lookup::<E>(&E::canonical_key(key)).map(|(_, v)| v)
    }

    fn fill_view<'s, E: EntryKind>(&'s self, view: &mut BTreeMap<&'s str, Option<&'s E>>) {
        if let Some(parent) = self.parent {
            parent.fill_view(view);
        }
        for (key, slot) in &E::set(&self.overlay).slots {
            view.insert(key.as_str(), slot.entry());
        }
    }

    /// Every visible entry of one type, in key order.
    pub fn entries<E: EntryKind>(&self) -> Vec<&E> {
        let mut view = BTreeMap::new();
        self.fill_view::<E>(&mut view);
        view.into_values().flatten().collect()
    }

    pub fn address(&self, address: &str) -> Option<&AddressEntry> {
        self.find::<AddressEntry>(address)
    }

    pub fn namespace(&self, namespace: &str) -> Option<&NamespaceEntry> {
        self.find::<NamespaceEntry>(namespace)
    }

    pub fn encumbrances(&self, address: &str) -> Option<&EncumbranceEntry> {
        self.find::<EncumbranceEntry>(address)
    }

    pub fn poa(&self, principal: &str) -> Option<&PoaEntry> {
        self.find::<PoaEntry>(principal)
    }

    pub fn contract(&self, address: &str) -> Option<&ContractEntry> {
        self.find::<ContractEntry>(address)
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Copy an inherited entry into this level. Returns false if absent.
    fn mark<E: EntryKind>(&mut self, key: &str) -> bool {
        match E::set(&self.overlay).slots.get(key) {
            Some(Slot::Live { .. }) => return true,
            Some(Slot::Removed) => return false,
            None => {}
        }
        let inherited = self
            .parent
            .and_then(|p| p.lookup::<E>(key))
            .map(|(entry, version)| (entry.clone(), version));
        match inherited {
            Some((entry, version)) => {
                E::set_mut(&mut self.overlay).slots.insert(
                    key.to_string(),
                    Slot::Live {
                        entry,
                        version: version + 1,
                    },
                );
                true
            }
            None => false,
        }
    }

    /// Mutable handle on an existing entry, copied into this level.
    pub fn find_and_mark_updated<E: EntryKind>(&mut self, key: &str) -> Option<&mut E> {
        let key = E::canonical_key(key);
        if !self.mark::<E>(&key) {
            return None;
        }
        match E::set_mut(&mut self.overlay).slots.get_mut(&key) {
            Some(Slot::Live { entry, .. }) => Some(entry),
            _ => None,
        }
    }

    /// Mutable handle, creating the entry with `make` when absent.
    ///
    /// Only for rules that explicitly permit creation on write.
    pub fn find_or_create<E: EntryKind>(
        &mut self,
        key: &str,
        make: impl FnOnce() -> E,
    ) -> Result<&mut E, StateError> {
        let key = E::canonical_key(key);
        let present = self.mark::<E>(&key);
        let slot = E::set_mut(&mut self.overlay)
            .slots
            .entry(key.clone())
            .or_insert(Slot::Removed);
        if !present {
            debug!(set = E::SET, key = %key, "creating entry on write");
            *slot = Slot::Live {
                entry: make(),
                version: 0,
            };
        }
        match slot {
            Slot::Live { entry, .. } => Ok(entry),
            Slot::Removed => Err(StateError::MissingEntry { set: E::SET, key }),
        }
    }

    /// Store a new entry.
    ///
    /// Overwriting an inherited entry without marking it first is a fault.
    pub fn insert<E: EntryKind>(&mut self, entry: E) -> Result<(), StateError> {
        let key = entry.key();
        let version = match E::set(&self.overlay).slots.get(&key) {
            Some(Slot::Live { version, .. }) => *version,
            Some(Slot::Removed) => 0,
            None => {
                if self.parent.and_then(|p| p.lookup::<E>(&key)).is_some() {
                    return Err(StateError::NotMarkedForUpdate { set: E::SET, key });
                }
                0
            }
        };
        E::set_mut(&mut self.overlay)
            .slots
            .insert(key, Slot::Live { entry, version });
        Ok(())
    }

    /// Delete an entry previously marked for update at this level.
    pub fn remove<E: EntryKind>(&mut self, key: &str) -> Result<(), StateError> {
        let key = E::canonical_key(key);
        match E::set(&self.overlay).slots.get(&key) {
            Some(Slot::Live { .. }) => {}
            Some(Slot::Removed) => return Err(StateError::MissingEntry { set: E::SET, key }),
            None => {
                return Err(if self.parent.and_then(|p| p.lookup::<E>(&key)).is_some() {
                    StateError::NotMarkedForUpdate { set: E::SET, key }
                } else {
                    StateError::MissingEntry { set: E::SET, key }
                });
            }
        }
        let slots = &mut E::set_mut(&mut self.overlay).slots;
        if self.parent.is_none() {
            slots.remove(&key);
        } else {
            slots.insert(key, Slot::Removed);
        }
        Ok(())
    }

    /// Mark then remove, for rules that delete an entry they did not edit.
    pub fn delete<E: EntryKind>(&mut self, key: &str) -> Result<(), StateError> {
        let key = E::canonical_key(key);
        if !self.mark::<E>(&key) {
            return Err(StateError::MissingEntry { set: E::SET, key });
        }
        self.remove::<E>(&key)
    }

    // =========================================================================
    // EFFECTIVE LIST & EVENTS
    // =========================================================================

    pub fn record(&mut self, effective: EffectiveTx) {
        self.effective.push(effective);
    }

    /// Changes recorded at this level, including merged children.
    pub fn effective_transactions(&self) -> &[EffectiveTx] {
        &self.effective
    }

    pub fn push_event(&mut self, event: ContractEvent) {
        self.events.own.push(event);
    }

    fn visible_events(&self) -> Vec<&ContractEvent> {
        let mut visible: Vec<&ContractEvent> = match self.parent {
            Some(parent) => parent
                .visible_events()
                .into_iter()
                .skip(self.events.consumed_from_parent)
                .collect(),
            None => Vec::new(),
        };
        visible.extend(self.events.own.iter());
        visible
    }

    /// Queued events not yet taken, oldest first.
    pub fn pending_events(&self) -> Vec<ContractEvent> {
        self.visible_events().into_iter().cloned().collect()
    }

    /// Take every queued event, including those inherited from parents.
    pub fn take_events(&mut self) -> Vec<ContractEvent> {
        let taken = self.pending_events();
        self.events.consumed_from_parent = self
            .parent
            .map(|p| p.visible_events().len())
            .unwrap_or(0);
        self.events.own.clear();
        taken
    }

    fn absorb_events(&mut self, child: EventQueue) {
        let inherited = self
            .parent
            .map(|p| p.visible_events().len())
            .unwrap_or(0)
            .saturating_sub(self.events.consumed_from_parent);
        let taken = child.consumed_from_parent;
        if taken <= inherited {
            self.events.consumed_from_parent += taken;
        } else {
            self.events.consumed_from_parent += inherited;
            let drop = (taken - inherited).min(self.events.own.len());
            self.events.own.drain(..drop);
        }
        self.events.own.extend(child.own);
    }

    // =========================================================================
    // COMMIT
    // =========================================================================

    /// Detach this level's changes, ending its borrow of the parent.
    pub fn into_changes(self) -> SnapshotChanges {
        SnapshotChanges {
            overlay: self.overlay,
            effective: self.effective,
            events: self.events,
            corrupted: self.corrupted,
        }
    }

    /// Publish a child's changes into this level atomically.
    pub fn merge(&mut self, changes: SnapshotChanges) -> Result<(), StateError> {
        if changes.corrupted || self.corrupted {
            self.corrupted = true;
            return Err(StateError::Corrupted);
        }
        self.overlay.absorb(changes.overlay, self.parent.is_none());
        self.effective.extend(changes.effective);
        self.absorb_events(changes.events);
        Ok(())
    }

    /// Keccak-256 over every visible entry, this level's effective list, and
    /// the visible event queue.
    pub fn digest(&self) -> Result<Hash, StateError> {
        let effective = &self.effective;
        let view = DigestView {
            addresses: self.entries::<AddressEntry>(),
            namespaces: self.entries::<NamespaceEntry>(),
            encumbrances: self.entries::<EncumbranceEntry>(),
            poas: self.entries::<PoaEntry>(),
            contracts: self.entries::<ContractEntry>(),
            effective,
            events: self.visible_events(),
        };
        Ok(codec::hash_of(&view)?)
    }
}

// =============================================================================
// LEDGER STATE (ROOT)
// =============================================================================

/// The committed root of the snapshot chain.
#[derive(Debug)]
pub struct LedgerState {
    root: StateSnapshot<'static>,
}

impl LedgerState {
    pub fn new(config: StateConfig) -> Self {
        Self::with_shared_config(Arc::new(config))
    }

    pub fn with_shared_config(config: Arc<StateConfig>) -> Self {
        Self {
            root: StateSnapshot::root(config),
        }
    }

    pub fn config(&self) -> &StateConfig {
        self.root.config()
    }

    /// A block-level snapshot over the committed state.
    pub fn snapshot(&self) -> StateSnapshot<'_> {
        self.root.create_snapshot()
    }

    /// Read access to committed state.
    pub fn view(&self) -> &StateSnapshot<'static> {
        &self.root
    }

    /// Direct access for genesis seeding.
    pub fn genesis(&mut self) -> &mut StateSnapshot<'static> {
        &mut self.root
    }

    /// Commit a block snapshot, returning its effective transactions.
    pub fn commit(&mut self, changes: SnapshotChanges) -> Result<Vec<EffectiveTx>, StateError> {
        self.root.merge(changes)?;
        Ok(std::mem::take(&mut self.root.effective))
    }

    pub fn digest(&self) -> Result<Hash, StateError> {
        self.root.digest()
    }
}
