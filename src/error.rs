//! Error types for the Tsunami driver.

use thiserror::Error;

/// Main error type for all driver operations.
#[derive(Debug, Error)]
pub enum DriverError {
    /// I/O error on the serial link.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error in the host-facing request/event format.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The link is not connected; the write was dropped.
    #[error("serial link not connected")]
    NotConnected,

    /// The driver task has shut down and no longer accepts requests.
    #[error("driver shut down")]
    ShutDown,
}

/// Result type alias using DriverError.
pub type Result<T> = std::result::Result<T, DriverError>;
