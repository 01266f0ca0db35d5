//! # Transaction Dispatch (LE-06)
//!
//! Entry point of the ledger engine: applies a block's transactions to a
//! snapshot, sweeps contract events, and commits.
//!
//! ## Dispatch Pipeline
//!
//! ```text
//!   tx ──→ [0 structure] ──→ [1 timestamp] ──→ [2 key ↔ address] ──→ [3 nonce]
//!                                                                      │
//!          ┌───────────────────────────────────────────────────────────┘
//!          ↓
//!      [4 permission, POA allowance] ──→ [5 asset locks] ──→ [6 type rule]
//!                                                              │ nested snapshot
//!                                              rule + POA draw-down + nonce bump
//!                                                              │ merge on success
//!                                                              ↓
//!                                                      EffectiveTx::Applied
//! ```
//!
//! The first failing step decides the [`Outcome`]. Ordinary failures are
//! `Outcome::Rejected` and leave the snapshot untouched; only a fatal
//! [`StateError`](le_02_ledger_state::StateError) is returned as `Err`, after
//! which the snapshot refuses further work.
//!
//! ## Block Processing
//!
//! [`TxProcessor::apply_batch`] orders the block, dispatches each
//! transaction, runs [`EventSweep::run`] and commits the block snapshot into
//! the root [`LedgerState`](le_02_ledger_state::LedgerState).

pub mod domain;

pub use domain::dispatcher::TxDispatcher;
pub use domain::outcome::Outcome;
pub use domain::processor::{BatchReport, TxProcessor, TxResult};
pub use domain::sweep::{EventSweep, SweepReport};
