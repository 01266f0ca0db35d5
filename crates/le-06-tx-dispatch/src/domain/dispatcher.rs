//! # Transaction Dispatcher
//!
//! Runs the admission checks and the type rule for one transaction against
//! one snapshot. The rule and the POA draw-down share a nested snapshot that
//! is merged only when both succeed, so an `Outcome::Rejected` never leaves
//! a trace.

use crate::domain::checks;
use crate::domain::outcome::Outcome;
use crate::domain::rules::{self, RuleContext};
use le_01_signature::SignatureVerifier;
use le_02_ledger_state::{AddressEntry, EffectiveTx, RuleError, RuleResult, StateError, StateSnapshot};
use le_04_power_of_attorney::{consume, PoaDemand};
use ledger_telemetry::{log_tx_event, record_rejection, record_transaction};
use ledger_types::{Transaction, TxType};
use std::sync::Arc;
use tracing::{debug, error, instrument};

const SUBSYSTEM: &str = "le-06-dispatch";

/// Applies transactions to snapshots.
#[derive(Clone)]
pub struct TxDispatcher {
    verifier: Arc<dyn SignatureVerifier>,
}

impl std::fmt::Debug for TxDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxDispatcher").finish_non_exhaustive()
    }
}

impl TxDispatcher {
    pub fn new(verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self { verifier }
    }

    pub fn verifier(&self) -> &dyn SignatureVerifier {
        self.verifier.as_ref()
    }

    /// Apply `tx` to `snapshot` at `block_time`.
    ///
    /// `priority` selects the processing pass; a transaction of another
    /// priority is a no-op. `is_replay` skips the key/address check for
    /// transactions already authorised elsewhere.
    ///
    /// # Errors
    ///
    /// Only fatal faults are errors. The snapshot is marked corrupted and
    /// refuses every later dispatch with [`StateError::Corrupted`].
    #[instrument(skip_all, fields(from = %tx.from_address, nonce = tx.nonce, block_time = block_time))]
    pub fn dispatch(
        &self,
        tx: &Transaction,
        snapshot: &mut StateSnapshot<'_>,
        block_time: i64,
        priority: i32,
        is_replay: bool,
    ) -> Result<Outcome, StateError> {
        if snapshot.is_corrupted() {
            return Err(StateError::Corrupted);
        }
        let type_label = tx.tx_type().map(TxType::name).unwrap_or("unknown");
        if priority != tx.priority {
            let outcome = Outcome::noop(format!(
                "priority {} is processed in another pass",
                tx.priority
            ));
            record_transaction(type_label, outcome.label());
            return Ok(outcome);
        }
        let hash = match tx.hash() {
            Ok(hash) => hash,
            Err(e) => {
                let fault = StateError::from(e);
                snapshot.mark_corrupted(&fault);
                return Err(fault);
            }
        };

        let outcome = match self.apply(tx, &hash, snapshot, block_time, is_replay) {
            Ok(status) => {
                log_tx_event!(info, SUBSYSTEM, "transaction accepted", hash, tx_type = type_label, %status);
                Outcome::Accepted { status }
            }
            Err(RuleError::Rejected(rejection)) => {
                log_tx_event!(
                    warn,
                    SUBSYSTEM,
                    "transaction rejected",
                    hash,
                    tx_type = type_label,
                    kind = %rejection.kind,
                    reason = %rejection.reason
                );
                record_rejection(rejection.kind.as_str());
                Outcome::Rejected(rejection)
            }
            Err(RuleError::Fatal(fault)) => {
                error!(tx_hash = %hash, error = %fault, "fatal fault while applying transaction");
                snapshot.mark_corrupted(&fault);
                return Err(fault);
            }
        };
        record_transaction(type_label, outcome.label());
        Ok(outcome)
    }

    /// Steps 0 to 6; the first failure wins.
    fn apply(
        &self,
        tx: &Transaction,
        hash: &str,
        snapshot: &mut StateSnapshot<'_>,
        block_time: i64,
        is_replay: bool,
    ) -> RuleResult<String> {
        let tx_type = checks::structure(tx, snapshot.config())?;
        checks::timestamp(tx, block_time, snapshot.config())?;
        if !is_replay {
            checks::key_matches_sender(self.verifier(), tx)?;
        }
        checks::nonce(snapshot, tx, tx_type)?;
        if snapshot.config().authorise_by_address {
            checks::permission(snapshot, tx, tx_type)?;
        }
        let demand = PoaDemand::for_transaction(tx);
        if let Some(demand) = &demand {
            checks::allowance(snapshot, tx, demand, block_time)?;
        }
        checks::unlocked(snapshot, tx, tx_type)?;
        debug!(tx_hash = %hash, %tx_type, "admission checks passed");

        let mut child = snapshot.create_snapshot();
        let ctx = RuleContext {
            verifier: self.verifier(),
            tx,
            hash,
            principal: tx.principal(),
            now: block_time,
        };
        // Drawn before the rule so a rule that deletes the principal's
        // grants still pays for itself.
        if let (Some(poa), Some(demand)) = (&tx.poa, &demand) {
            consume(
                &mut child,
                &poa.principal,
                &poa.reference,
                &tx.from_address,
                demand,
                block_time,
            )?;
        }
        let status = rules::apply(&mut child, &ctx)?;
        let sender_deleted =
            tx_type == TxType::DeleteAddress && !child.exists::<AddressEntry>(&tx.from_address);
        if !sender_deleted {
            bump_nonce(&mut child, &tx.from_address, block_time)?;
        }
        child.record(EffectiveTx::Applied {
            hash: hash.to_string(),
            tx_type,
        });
        let changes = child.into_changes();
        snapshot.merge(changes)?;
        Ok(status)
    }
}

fn bump_nonce(snapshot: &mut StateSnapshot<'_>, address: &str, block_time: i64) -> Result<(), StateError> {
    let entry = snapshot
        .find_and_mark_updated::<AddressEntry>(address)
        .ok_or_else(|| StateError::MissingEntry {
            set: "addresses",
            key: address.to_string(),
        })?;
    entry.nonce += 1;
    entry.last_active = entry.last_active.max(block_time);
    Ok(())
}
