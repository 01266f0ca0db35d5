//! # Contract Settlement (LE-05)
//!
//! Long-lived contracts that collect signatures across many transactions and
//! move assets atomically once their conditions hold.
//!
//! ## Lifecycle
//!
//! ```text
//!   NewContract ──→ Pending ──commit (satisfied)──→ AwaitingEvent
//!                     ↑  │                              │
//!                     └──┼──commit (unsatisfied)────────┘
//!                        │                              │ event
//!                        │ cancel                       ↓
//!                        ↓                     settled (DVP deleted)
//!                    Cancelled
//!
//!   time event past expiry: DVP deleted, Exchange/Nominate → Completed
//! ```
//!
//! ## Families
//!
//! | Family | Commit carries | Settles |
//! |--------|----------------|---------|
//! | DVP | party, payment, parameter, authorisation signatures | on the next event once satisfied |
//! | Exchange | a block multiple of every input | immediately, per commit |
//! | Nominate | input amounts, optionally delegated | immediately, per commit |
//!
//! Every contract carries a `next_time_event`. The event sweep asks
//! [`due_time_events`] for contracts whose time has come and hands each to
//! [`resolve_event`]. Resolving an event for a contract that is gone or
//! closed is a no-op, so event replay cannot settle twice.

pub mod domain;

pub use domain::context::ContractContext;
pub use domain::dvp::unsatisfied_reason;
pub use domain::expression::{amount_value, Expression, ExpressionError};
pub use domain::lifecycle::{
    cancel_contract, commit_contract, create_contract, due_time_events, resolve_event, Resolution,
};
