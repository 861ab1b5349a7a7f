//! # cortical-settings
//!
//! Configuration for the Cortical server with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`CorticalSettings::default()`]
//! 2. **User file**: `~/.cortical/settings.json`, merged over the defaults
//! 3. **Environment variables**: `CORTICAL_*` overrides (highest priority)
//!
//! There is no global instance. The binary loads a [`CorticalSettings`] once
//! at startup and passes it by reference to whatever needs it, including every
//! cortex factory.
//!
//! # Usage
//!
//! ```no_run
//! let settings = cortical_settings::load_settings().unwrap_or_default();
//! println!("listening on port {}", settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    load_settings, load_settings_from_path, load_settings_or_defaults, load_settings_with, merge_layer,
    settings_path,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = CorticalSettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = CorticalSettings::default();
        assert_eq!(settings.version, "0.1.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.fanout_lag, 1);
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.cortexes.enabled, vec!["echo".to_string()]);
    }
}
