//! Cortex error types.

use cortical_core::CoreError;

/// Errors raised while building or running the built-in cortexes.
///
/// Errors during a session never reach the dispatcher; cortexes log and drop
/// them. These surface at startup (registry, HTTP client) or in tests.
#[derive(Debug, thiserror::Error)]
pub enum CortexError {
    /// Shared error (unknown cortex, malformed payload, JSON).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// HTTP client construction or request failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The inference endpoint answered with a non-success status.
    #[error("inference endpoint returned {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CortexError>;
