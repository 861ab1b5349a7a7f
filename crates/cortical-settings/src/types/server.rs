//! Server, dispatcher and logging settings.

use serde::{Deserialize, Serialize};

/// HTTP listener and per-session dispatcher tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port (`0` picks a free port).
    pub port: u16,
    /// Directory served for every path that is not `/ws`, `/health` or `/metrics`.
    pub static_dir: String,
    /// Buffer depth of each fan-out channel: how far a slow consumer may
    /// fall behind the fastest one.
    pub fanout_lag: usize,
    /// Consecutive non-close transport errors a connection loop tolerates
    /// before the session is torn down.
    pub max_consecutive_errors: u32,
    /// Upper bound on session teardown after stop signals are fired.
    pub drain_timeout_ms: u64,
    /// Largest websocket message accepted, in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_dir: "htdocs".to_string(),
            fanout_lag: 1,
            max_consecutive_errors: 8,
            drain_timeout_ms: 5_000,
            max_message_size: 16 * 1024 * 1024, // 16 MB
        }
    }
}

/// Log line format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
