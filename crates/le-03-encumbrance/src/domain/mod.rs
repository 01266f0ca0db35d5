//! Encumbrance rules over a ledger snapshot.

pub mod engine;
pub mod settlement;
