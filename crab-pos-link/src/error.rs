//! Error types for the printer link

use thiserror::Error;

/// Printer link error types
///
/// Only caller-facing operations return these. The background loops never
/// fail outward; they report [`crate::LinkFault`]s instead.
#[derive(Debug, Error)]
pub enum PrintError {
    /// Could not reach the device
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error on the transport
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout waiting for the device
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid link or transport configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// The link has been shut down
    #[error("Printer link closed")]
    Closed,
}

/// Result type for printer link operations
pub type PrintResult<T> = Result<T, PrintError>;
