//! # Ledger State (LE-02)
//!
//! The versioned state container every ledger rule reads and writes.
//!
//! ## Model
//!
//! ```text
//!   LedgerState (root)          committed entries, no tombstones
//!        ▲ borrows
//!   StateSnapshot (block)       sparse overlay: key → Live | Removed
//!        ▲ borrows
//!   StateSnapshot (per tx)      discarded on rejection, merged on success
//! ```
//!
//! Reads fall through the overlay chain to the root. Writes only ever land in
//! the innermost overlay, and only through `find_and_mark_updated`,
//! `find_or_create` or `insert`. Committing a child is
//! `parent.merge(child.into_changes())`; dropping a child discards it.
//!
//! ## Entry Sets
//!
//! | Set | Key | Entry |
//! |-----|-----|-------|
//! | `addresses` | address | [`AddressEntry`] |
//! | `namespaces` | namespace | [`NamespaceEntry`] |
//! | `encumbrances` | address | [`EncumbranceEntry`] |
//! | `poas` | principal address | [`PoaEntry`] |
//! | `contracts` | contract address | [`ContractEntry`] |

pub mod balances;
pub mod config;
pub mod entries;
pub mod entry_set;
pub mod errors;
pub mod snapshot;

pub use balances::*;
pub use config::{PoaZeroCeiling, StateConfig};
pub use entries::*;
pub use entry_set::{EntryKind, EntrySet, Overlay, Slot};
pub use errors::{RuleError, RuleResult, StateError};
pub use snapshot::{
    ContractEvent, EffectiveTx, EventKind, LedgerState, SnapshotChanges, StateSnapshot,
};
