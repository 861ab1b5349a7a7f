//! `/health` endpoint body.

use std::time::Instant;

use serde::Serialize;

use crate::websocket::session::Dispatcher;

/// Liveness snapshot served at `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while the listener accepts connections.
    pub status: &'static str,
    /// Whole seconds since the server was created.
    pub uptime_secs: u64,
    /// Sessions between `Active` and `Closed`.
    pub active_sessions: usize,
    /// Cortex names, in the order each session instantiates them.
    pub cortexes: Vec<String>,
}

impl HealthResponse {
    /// Read the dispatcher's live counters.
    pub fn snapshot(started: Instant, dispatcher: &Dispatcher) -> Self {
        Self {
            status: "ok",
            uptime_secs: started.elapsed().as_secs(),
            active_sessions: dispatcher.active_sessions(),
            cortexes: dispatcher.cortex_names().into_iter().map(str::to_owned).collect(),
        }
    }
}
