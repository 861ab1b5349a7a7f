//! Metric names and the Prometheus exporter behind `/metrics`.
//!
//! Recording goes through the `metrics` facade macros; without an installed
//! recorder they are no-ops, which is what unit tests rely on.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::{Result, ServerError};

/// Install a process-global Prometheus recorder.
///
/// Fails if another recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("metrics recorder ready");
    Ok(handle)
}

/// Prometheus text exposition of everything recorded so far.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// WebSocket sessions opened (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket sessions closed (counter, labels: reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Sessions currently running (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Session lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Upgrade requests that never reached `Active` (counter).
pub const WS_UPGRADE_FAILURES_TOTAL: &str = "ws_upgrade_failures_total";
/// Text frames read from peers (counter).
pub const WS_FRAMES_IN_TOTAL: &str = "ws_frames_in_total";
/// Text frames written to peers (counter).
pub const WS_FRAMES_OUT_TOTAL: &str = "ws_frames_out_total";
/// Non-text data frames rejected with a 501 envelope (counter).
pub const WS_PROTOCOL_VIOLATIONS_TOTAL: &str = "ws_protocol_violations_total";
/// Non-close transport errors (counter, labels: loop).
pub const WS_TRANSPORT_ERRORS_TOTAL: &str = "ws_transport_errors_total";
/// Tasks aborted at the end of a session's drain timeout (counter).
pub const SESSION_ABORTED_TASKS_TOTAL: &str = "session_aborted_tasks_total";
/// Cortex instantiations (counter, labels: cortex).
pub const CORTEX_INSTANCES_TOTAL: &str = "cortex_instances_total";
