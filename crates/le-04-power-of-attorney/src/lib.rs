//! # Power of Attorney (LE-04)
//!
//! Lets an attorney submit a restricted set of transaction types on behalf
//! of a principal.
//!
//! ## Grant Layout
//!
//! ```text
//!   PoaEntry (principal)
//!     └── reference → PoaGrant { attorney, start, expiry }
//!                        └── PoaItem { tx_type, ceiling, assets[] }
//! ```
//!
//! ## Allowance Rules
//!
//! | Check | Failure |
//! |-------|---------|
//! | grant exists for (principal, reference) | precondition |
//! | grant names the submitting attorney | precondition |
//! | `start <= now <= expiry` | precondition |
//! | an item for the type whitelists every touched asset | precondition |
//! | the item's remaining ceiling covers the amount | precondition |
//!
//! A zero ceiling follows [`PoaZeroCeiling`](le_02_ledger_state::PoaZeroCeiling):
//! an asset allow-list matched to any amount, or an exhausted item.
//!
//! Consumption only ever lowers a ceiling. An amount-bounded item is removed
//! when its ceiling reaches zero, a grant with no items left is removed, and
//! an entry with no grants left is deleted.

pub mod domain;

pub use domain::allowance::{authorise, consume};
pub use domain::demand::PoaDemand;
pub use domain::grants::{grant, prune_expired, revoke, GrantRequest};
