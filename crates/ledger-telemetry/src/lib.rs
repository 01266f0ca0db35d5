//! # Ledger Telemetry
//!
//! Logging and metrics for the ledger engine.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledger_telemetry::{init_tracing, TelemetryConfig};
//!
//! fn main() {
//!     init_tracing(&TelemetryConfig::from_env()).expect("subscriber already set");
//!     // Dispatch transactions; spans, logs and counters are now collected.
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RUST_LOG` | unset | Filter directives, take precedence |
//! | `LEDGER_LOG_LEVEL` | `info` | Level filter when `RUST_LOG` is unset |
//! | `LEDGER_JSON_LOGS` | `false` | One JSON object per line instead of pretty output |
//! | `LEDGER_SERVICE_NAME` | `ledger-engine` | `service` field on the startup line |
//!
//! ## Metrics
//!
//! | Metric | Labels |
//! |--------|--------|
//! | `le_dispatch_transactions_total` | `tx_type`, `outcome` |
//! | `le_dispatch_rejections_total` | `kind` |
//! | `le_contract_events_total` | `family`, `outcome` |
//! | `le_snapshot_commits_total` | |
//!
//! [`gather_metrics`] renders the Prometheus text format. Serving it is left
//! to the embedding node.

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_tracing;
pub use metrics::{
    gather_metrics, record_contract_event, record_rejection, record_snapshot_commit,
    record_transaction, register_metrics, CONTRACT_EVENTS, REGISTRY, REJECTIONS, SNAPSHOT_COMMITS,
    TRANSACTIONS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to register metrics: {0}")]
    MetricsInit(String),

    #[error("Failed to encode metrics: {0}")]
    MetricsEncode(String),
}

/// Increment a counter, optionally selecting label values.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
