//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use cortical_settings::ServerSettings;

/// Per-session dispatch tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Buffer depth of each fan-out output.
    pub fanout_lag: usize,
    /// Consecutive transport errors tolerated by each connection loop.
    pub max_consecutive_errors: u32,
    /// How long teardown waits for tasks before aborting them.
    pub drain_timeout: Duration,
    /// Buffer between the read loop and the fan-out.
    pub inbound_capacity: usize,
    /// Buffer between a producer worker and its merge relay.
    pub worker_capacity: usize,
    /// Buffer for error envelopes waiting on the write loop.
    pub control_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            fanout_lag: 1,
            max_consecutive_errors: 8,
            drain_timeout: Duration::from_secs(5),
            inbound_capacity: 1,
            worker_capacity: 1,
            control_capacity: 16,
        }
    }
}

impl DispatchConfig {
    /// Take the dispatch fields from the `server` settings section.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            fanout_lag: settings.fanout_lag,
            max_consecutive_errors: settings.max_consecutive_errors,
            drain_timeout: Duration::from_millis(settings.drain_timeout_ms),
            ..Self::default()
        }
    }
}

/// Configuration for the Cortical server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Directory served for unmatched paths.
    pub static_dir: PathBuf,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Per-session dispatch tuning.
    pub dispatch: DispatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            static_dir: PathBuf::from("htdocs"),
            max_message_size: 16 * 1024 * 1024, // 16 MB
            dispatch: DispatchConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build from the `server` settings section.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            static_dir: PathBuf::from(&settings.static_dir),
            max_message_size: settings.max_message_size,
            dispatch: DispatchConfig::from_settings(settings),
        }
    }

    /// `host:port`, as passed to the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
