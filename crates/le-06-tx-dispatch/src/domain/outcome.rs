//! What dispatching one transaction produced.

use ledger_types::Rejection;

/// Result of an ordinary dispatch. Fatal faults travel separately as
/// `StateError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// State changed; `status` says how.
    Accepted { status: String },
    /// Refused with no state change.
    Rejected(Rejection),
    /// Not for this pass; nothing was checked or changed.
    NoOp { reason: String },
}

impl Outcome {
    pub fn accepted(status: impl Into<String>) -> Self {
        Outcome::Accepted {
            status: status.into(),
        }
    }

    pub fn noop(reason: impl Into<String>) -> Self {
        Outcome::NoOp {
            reason: reason.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted { .. })
    }

    /// The rejection, when there is one.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Rejected(r) => Some(r),
            _ => None,
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Accepted { .. } => "accepted",
            Outcome::Rejected(_) => "rejected",
            Outcome::NoOp { .. } => "noop",
        }
    }
}
