//! Subscriber installation and structured log macros.
//!
//! Every ledger log line carries a `subsystem` field. Transaction lines add
//! `tx_hash`, contract lines add `contract`, so one filter follows a
//! transaction or a contract through dispatch, commit and settlement.

use crate::{TelemetryConfig, TelemetryError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// Fails with [`TelemetryError::SubscriberInit`] when one is already set, so
/// tests may call it repeatedly and ignore the error.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Filter(e.to_string()))?;

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;
    }

    tracing::info!(
        service = %config.service_name,
        json = config.json_logs,
        "tracing initialized"
    );
    Ok(())
}

/// Log a transaction-related event with standard fields.
///
/// ```rust,ignore
/// log_tx_event!(info, "dispatch", "transaction accepted", hash, tx_type = ?ty);
/// ```
#[macro_export]
macro_rules! log_tx_event {
    ($level:ident, $subsystem:expr, $msg:expr, $tx_hash:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            tx_hash = %$tx_hash,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a contract-related event with standard fields.
#[macro_export]
macro_rules! log_contract_event {
    ($level:ident, $subsystem:expr, $msg:expr, $contract:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            contract = %$contract,
            $($($field)*,)?
            $msg
        )
    };
}
