//! # Error Types
//!
//! Custom error types for DashLink using `thiserror`.
//!
//! Expected operational conditions (link not ready, empty batch, truncated
//! notification) are not errors; the session reports them as no-ops.

use thiserror::Error;

/// Main error type for DashLink
#[derive(Debug, Error)]
pub enum DashLinkError {
    /// Wire protocol errors
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Transport rejected or could not carry a write
    #[error("Transport error: {0}")]
    Transport(String),

    /// The session task has exited and no longer accepts commands
    #[error("Session closed")]
    SessionClosed,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Telemetry record serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for DashLink
pub type Result<T> = std::result::Result<T, DashLinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DashLinkError::Transport("characteristic not resolved".to_string());
        assert_eq!(err.to_string(), "Transport error: characteristic not resolved");

        let err = DashLinkError::SessionClosed;
        assert_eq!(err.to_string(), "Session closed");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DashLinkError = io.into();
        assert!(matches!(err, DashLinkError::Io(_)));
    }
}
