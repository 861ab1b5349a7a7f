//! Core error types.

use thiserror::Error;

/// Errors shared across the Cortical crates.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A cortex name in the configuration has no registered factory.
    #[error("unknown cortex: {0}")]
    UnknownCortex(String),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_cortex_display() {
        let err = CoreError::UnknownCortex("vision".into());
        assert_eq!(err.to_string(), "unknown cortex: vision");
    }

    #[test]
    fn json_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(matches!(err, CoreError::Json(_)));
    }
}
