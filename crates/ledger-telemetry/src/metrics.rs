//! Prometheus counters for the ledger engine.
//!
//! All metrics follow the naming convention: `le_<component>_<metric>_total`

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Crate-local registry; nothing is registered with the prometheus default.
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // DISPATCH METRICS (LE-06)
    // =========================================================================

    /// Dispatched transactions by type and outcome
    pub static ref TRANSACTIONS: CounterVec = CounterVec::new(
        Opts::new("le_dispatch_transactions_total", "Transactions dispatched"),
        &["tx_type", "outcome"]  // outcome: accepted/rejected/noop
    ).expect("metric creation failed");

    /// Rejections by taxonomy bucket
    pub static ref REJECTIONS: CounterVec = CounterVec::new(
        Opts::new("le_dispatch_rejections_total", "Rejected transactions by kind"),
        &["kind"]
    ).expect("metric creation failed");

    // =========================================================================
    // CONTRACT METRICS (LE-05)
    // =========================================================================

    /// Resolved contract events
    pub static ref CONTRACT_EVENTS: CounterVec = CounterVec::new(
        Opts::new("le_contract_events_total", "Contract events resolved by the sweep"),
        &["family", "outcome"]  // outcome: settled/expired/deferred/ignored/failed
    ).expect("metric creation failed");

    // =========================================================================
    // STATE METRICS (LE-02)
    // =========================================================================

    pub static ref SNAPSHOT_COMMITS: Counter = Counter::new(
        "le_snapshot_commits_total",
        "Snapshots committed to the root ledger state"
    ).expect("metric creation failed");
}

/// Register all metrics with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(TRANSACTIONS.clone()),
        Box::new(REJECTIONS.clone()),
        Box::new(CONTRACT_EVENTS.clone()),
        Box::new(SNAPSHOT_COMMITS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    register_metrics()?;
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsEncode(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsEncode(e.to_string()))
}

pub fn record_transaction(tx_type: &str, outcome: &str) {
    TRANSACTIONS.with_label_values(&[tx_type, outcome]).inc();
}

pub fn record_rejection(kind: &str) {
    REJECTIONS.with_label_values(&[kind]).inc();
}

pub fn record_contract_event(family: &str, outcome: &str) {
    CONTRACT_EVENTS.with_label_values(&[family, outcome]).inc();
}

pub fn record_snapshot_commit() {
    SNAPSHOT_COMMITS.inc();
}
