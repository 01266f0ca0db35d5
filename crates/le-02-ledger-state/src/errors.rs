//! # State Errors
//!
//! `StateError` is the fatal class: a programming or data-corruption fault
//! that must abort processing. Ordinary answers to bad transactions are
//! `Rejection`s and travel inside `RuleError::Rejected`.

use ledger_types::{CodecError, Rejection, RejectionKind};
use thiserror::Error;

/// Internal invariant violation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Entry `{key}` in `{set}` was written without being marked for update")]
    NotMarkedForUpdate { set: &'static str, key: String },

    #[error("Encumbrance {reference} on {address} for {asset} would go negative")]
    NegativeEncumbrance {
        address: String,
        asset: String,
        reference: String,
    },

    #[error("Balance overflow for {address} in {asset}")]
    BalanceOverflow { address: String, asset: String },

    #[error("Entry `{key}` missing from `{set}`")]
    MissingEntry { set: &'static str, key: String },

    #[error("Snapshot is corrupted by an earlier fatal error")]
    Corrupted,

    #[error("Codec failure: {0}")]
    Codec(String),
}

impl From<CodecError> for StateError {
    fn from(err: CodecError) -> Self {
        StateError::Codec(err.to_string())
    }
}

/// Outcome of a failed rule: an ordinary rejection or a fatal fault.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("rejected: {0}")]
    Rejected(Rejection),

    #[error("fatal: {0}")]
    Fatal(StateError),
}

pub type RuleResult<T> = Result<T, RuleError>;

impl RuleError {
    pub fn structural(reason: impl Into<String>) -> Self {
        RuleError::Rejected(Rejection::structural(reason))
    }

    pub fn precondition(reason: impl Into<String>) -> Self {
        RuleError::Rejected(Rejection::precondition(reason))
    }

    pub fn signature(reason: impl Into<String>) -> Self {
        RuleError::Rejected(Rejection::signature(reason))
    }

    pub fn contract_state(reason: impl Into<String>) -> Self {
        RuleError::Rejected(Rejection::contract_state(reason))
    }

    /// The rejection kind, or `None` for fatal errors.
    pub fn kind(&self) -> Option<RejectionKind> {
        match self {
            RuleError::Rejected(r) => Some(r.kind),
            RuleError::Fatal(_) => None,
        }
    }
}

impl From<Rejection> for RuleError {
    fn from(r: Rejection) -> Self {
        RuleError::Rejected(r)
    }
}

impl From<StateError> for RuleError {
    fn from(e: StateError) -> Self {
        RuleError::Fatal(e)
    }
}

/// In-memory encoding of engine values cannot fail on valid data, so a codec
/// error inside a rule is a fault, not a rejection.
impl From<CodecError> for RuleError {
    fn from(e: CodecError) -> Self {
        RuleError::Fatal(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_error_conversions() {
        let r: RuleError = Rejection::precondition("nope").into();
        assert_eq!(r.kind(), Some(RejectionKind::Precondition));

        let f: RuleError = StateError::Corrupted.into();
        assert_eq!(f.kind(), None);

        let c: RuleError = CodecError::Encode("x".into()).into();
        assert!(matches!(c, RuleError::Fatal(StateError::Codec(_))));
    }
}
