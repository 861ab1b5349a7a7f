//! Errors raised while loading settings.

use thiserror::Error;

/// Why a settings file could not be turned into [`crate::CorticalSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file exists but could not be read.
    #[error("cannot read settings: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid JSON, or does not match the settings shape.
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),
    /// A value parsed but breaks a cross-field rule.
    #[error("invalid setting {key}: {reason}")]
    Invalid {
        /// Dotted camelCase path of the offending key.
        key: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Result alias for settings loading.
pub type Result<T> = std::result::Result<T, SettingsError>;
