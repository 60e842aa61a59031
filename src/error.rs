//! Error types for connection lifecycle operations
//!
//! Errors are `Clone` because a single shared connect attempt may have many
//! caller handles attached to it, and every one of them must observe the
//! same resolution.

use thiserror::Error;

/// Main error type for connection lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A channel was requested while none is available and no new connect
    /// attempt is permitted in the current state
    #[error("Not connected")]
    NotConnected,

    /// A pending connect attempt was abandoned by an explicit disconnect
    #[error("Client disconnected")]
    Disconnected,

    /// The connect delegate failed
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// The keep-alive delegate failed
    #[error("Keep-alive failed: {0}")]
    KeepAliveFailed(String),

    /// The state machine task is no longer running
    #[error("State machine has shut down")]
    Shutdown,
}

/// Result type alias for connection lifecycle operations
pub type Result<T> = std::result::Result<T, Error>;
