//! # Event Sweep
//!
//! Post-processing pass run once per block after its transactions:
//!
//! 1. time events for every open contract whose `next_time_event` is due;
//! 2. commit events queued by this block's transactions, until the queue is
//!    empty.
//!
//! Each event resolves in its own nested snapshot. A rejected resolution is
//! discarded and logged; it never stops the sweep. Only fatal faults do.

use le_02_ledger_state::{ContractEvent, RuleError, StateError, StateSnapshot};
use le_05_contracts::{due_time_events, resolve_event, Resolution};
use ledger_telemetry::{log_contract_event, record_contract_event};
use tracing::{error, instrument};

const SUBSYSTEM: &str = "le-06-sweep";

/// Counts of what one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub settled: usize,
    pub expired: usize,
    pub deferred: usize,
    pub ignored: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn events(&self) -> usize {
        self.settled + self.expired + self.deferred + self.ignored + self.failed
    }
}

/// The post-processing event sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventSweep;

impl EventSweep {
    /// Resolve every due time event, then drain the commit event queue.
    ///
    /// # Errors
    ///
    /// A fatal fault marks the snapshot corrupted and stops the sweep.
    #[instrument(skip_all, fields(block_time = block_time))]
    pub fn run(snapshot: &mut StateSnapshot<'_>, block_time: i64) -> Result<SweepReport, StateError> {
        if snapshot.is_corrupted() {
            return Err(StateError::Corrupted);
        }
        let mut report = SweepReport::default();
        for event in due_time_events(snapshot, block_time) {
            Self::resolve_one(snapshot, &event, block_time, &mut report)?;
        }
        loop {
            let queued = snapshot.take_events();
            if queued.is_empty() {
                break;
            }
            for event in queued {
                Self::resolve_one(snapshot, &event, block_time, &mut report)?;
            }
        }
        Ok(report)
    }

    fn resolve_one(
        snapshot: &mut StateSnapshot<'_>,
        event: &ContractEvent,
        block_time: i64,
        report: &mut SweepReport,
    ) -> Result<(), StateError> {
        let family = snapshot
            .contract(&event.contract)
            .map(|c| c.family.as_str())
            .unwrap_or("unknown");

        let mut child = snapshot.create_snapshot();
        let result = resolve_event(&mut child, event, block_time);
        let outcome = match result {
            Ok(resolution) => {
                let changes = child.into_changes();
                snapshot.merge(changes)?;
                match &resolution {
                    Resolution::Settled { moves } => {
                        report.settled += 1;
                        log_contract_event!(info, SUBSYSTEM, "contract settled", event.contract, family, moves);
                        "settled"
                    }
                    Resolution::Expired => {
                        report.expired += 1;
                        log_contract_event!(info, SUBSYSTEM, "contract expired", event.contract, family);
                        "expired"
                    }
                    Resolution::Deferred(reason) => {
                        report.deferred += 1;
                        log_contract_event!(warn, SUBSYSTEM, "contract not settled", event.contract, family, %reason);
                        "deferred"
                    }
                    Resolution::Ignored(reason) => {
                        report.ignored += 1;
                        log_contract_event!(debug, SUBSYSTEM, "event ignored", event.contract, family, %reason);
                        "ignored"
                    }
                }
            }
            Err(RuleError::Rejected(rejection)) => {
                drop(child);
                report.failed += 1;
                log_contract_event!(
                    warn,
                    SUBSYSTEM,
                    "event resolution rejected",
                    event.contract,
                    family,
                    kind = %rejection.kind,
                    reason = %rejection.reason
                );
                "failed"
            }
            Err(RuleError::Fatal(fault)) => {
                drop(child);
                error!(contract = %event.contract, error = %fault, "fatal fault during event sweep");
                snapshot.mark_corrupted(&fault);
                return Err(fault);
            }
        };
        record_contract_event(family, outcome);
        Ok(())
    }
}
