//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a partial
//! JSON file only needs the fields it changes.

mod cortex;
mod server;

pub use cortex::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9090, "fanoutLag": 4 },
///   "cortexes": { "enabled": ["echo", "ping"], "ping": { "intervalMs": 500 } }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorticalSettings {
    /// Settings schema version.
    pub version: String,
    /// HTTP listener and dispatcher tuning.
    pub server: ServerSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Which cortexes run per session, and their parameters.
    pub cortexes: CortexSettings,
}

impl Default for CorticalSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
            cortexes: CortexSettings::default(),
        }
    }
}

impl CorticalSettings {
    /// Reject combinations that deserialize fine but cannot run.
    pub fn validate(&self) -> Result<()> {
        let invalid = |key, reason| Err(SettingsError::Invalid { key, reason });
        if self.server.max_consecutive_errors == 0 {
            return invalid("server.maxConsecutiveErrors", "must be at least 1");
        }
        if self.cortexes.dummy.max_ms <= self.cortexes.dummy.min_ms {
            return invalid("cortexes.dummy.maxMs", "must exceed cortexes.dummy.minMs");
        }
        if self.cortexes.ping.interval_ms == 0 {
            return invalid("cortexes.ping.intervalMs", "must be positive");
        }
        Ok(())
    }
}
