//! # Encumbrance Engine (LE-03)
//!
//! Reserves part of an address's balance under a named reference. The
//! reservation is gated by administrators (who may release it) and
//! beneficiaries (who may exercise it).
//!
//! ## Accounting
//!
//! ```text
//!   spendable = balance − Σ amount(non-cumulative references)
//! ```
//!
//! | Kind | Checked at encumber | Reduces spendable | Exercise draws on |
//! |------|---------------------|-------------------|-------------------|
//! | non-cumulative | `reserved + amount ≤ balance` | yes | the reserved balance |
//! | cumulative | no | no | spendable balance |
//!
//! ## Operations
//!
//! | Operation | Who may act |
//! |-----------|-------------|
//! | [`encumber`] | the encumbered address |
//! | [`unencumber`] | an administrator, a beneficiary, anyone once expired, or the owner under `allow_owner_release` |
//! | [`exercise`] | a currently valid beneficiary |
//! | [`lock_holding`] / [`unlock_holding`] | the namespace owner |
//!
//! Every operation validates fully before it writes, so a rejection leaves
//! the snapshot untouched even without a nested snapshot around it.

pub mod domain;

pub use domain::engine::{
    encumber, exercise, lock_holding, unencumber, unlock_holding, EncumberRequest,
    ExerciseRequest, UnencumberRequest,
};
pub use domain::settlement::{covering_reference, draw_down, reference_can_pay, release_reference};
