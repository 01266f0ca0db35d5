//! # Batch Processor
//!
//! Applies one block: every transaction in processing order, then the event
//! sweep, then a single commit into the root state.
//!
//! Processing order is `(priority, sender, nonce)`. Lower priority values go
//! first, and a sender's transactions run in nonce order.

use crate::domain::dispatcher::TxDispatcher;
use crate::domain::outcome::Outcome;
use crate::domain::sweep::{EventSweep, SweepReport};
use le_01_signature::SignatureVerifier;
use le_02_ledger_state::{EffectiveTx, LedgerState, StateError};
use ledger_telemetry::record_snapshot_commit;
use ledger_types::Transaction;
use std::sync::Arc;
use tracing::{info, instrument};

/// Outcome of one transaction in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxResult {
    pub hash: String,
    pub outcome: Outcome,
}

/// Everything one block did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// In processing order.
    pub results: Vec<TxResult>,
    pub sweep: SweepReport,
    /// What was committed, in order.
    pub effective: Vec<EffectiveTx>,
}

impl BatchReport {
    pub fn accepted(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_accepted()).count()
    }

    pub fn rejected(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Rejected(_)))
            .count()
    }

    pub fn outcome_of(&self, hash: &str) -> Option<&Outcome> {
        self.results.iter().find(|r| r.hash == hash).map(|r| &r.outcome)
    }
}

/// Block-level driver around a [`TxDispatcher`].
#[derive(Debug, Clone)]
pub struct TxProcessor {
    dispatcher: TxDispatcher,
}

impl TxProcessor {
    pub fn new(verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self {
            dispatcher: TxDispatcher::new(verifier),
        }
    }

    pub fn dispatcher(&self) -> &TxDispatcher {
        &self.dispatcher
    }

    /// Apply `txs` as one block at `block_time` and commit the result.
    ///
    /// # Errors
    ///
    /// On a fatal fault nothing is committed and `state` is unchanged.
    #[instrument(skip_all, fields(txs = txs.len(), block_time = block_time))]
    pub fn apply_batch(
        &self,
        state: &mut LedgerState,
        txs: &[Transaction],
        block_time: i64,
    ) -> Result<BatchReport, StateError> {
        let mut ordered: Vec<&Transaction> = txs.iter().collect();
        ordered.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| {
                    a.from_address
                        .to_ascii_lowercase()
                        .cmp(&b.from_address.to_ascii_lowercase())
                })
                .then_with(|| a.nonce.cmp(&b.nonce))
        });

        let mut report = BatchReport::default();
        let mut snapshot = state.snapshot();
        for tx in ordered {
            let outcome = self
                .dispatcher
                .dispatch(tx, &mut snapshot, block_time, tx.priority, false)?;
            report.results.push(TxResult {
                hash: tx.hash()?,
                outcome,
            });
        }
        report.sweep = EventSweep::run(&mut snapshot, block_time)?;

        let changes = snapshot.into_changes();
        report.effective = state.commit(changes)?;
        record_snapshot_commit();

        info!(
            accepted = report.accepted(),
            rejected = report.rejected(),
            effective = report.effective.len(),
            events = report.sweep.events(),
            "block applied"
        );
        Ok(report)
    }
}
