//! Error types for bridge operations

use crate::channel::ChannelError;
use crate::router::Mode;
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors surfaced to callers of the bridge.
///
/// All of these are local to the calling context: none of them affect other
/// in-flight requests.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No correlated response arrived in time. Retrying is the caller's call.
    #[error("request {command} timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    /// The bridge was destroyed before or while the operation ran
    #[error("bridge destroyed, {0} abandoned")]
    Destroyed(String),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote side answered with a value of the wrong shape
    #[error("invalid response to {command}: {source}")]
    InvalidResponse {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    /// Operation only makes sense in the other mode
    #[error("{operation} is not available in {mode} mode")]
    WrongMode { operation: &'static str, mode: Mode },
}

impl BridgeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Command or event name the error refers to, if any
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Timeout { command, .. }
            | Self::InvalidResponse { command, .. }
            | Self::Destroyed(command) => Some(command.as_str()),
            _ => None,
        }
    }
}
