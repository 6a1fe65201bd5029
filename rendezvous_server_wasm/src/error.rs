//! Error types for the WASM signaling relay

use rendezvous_protocol::{ConnectionId, ProtocolError};
use rendezvous_signaling::RelayError;
use thiserror::Error;

/// Errors that can occur while relaying
#[derive(Error, Debug)]
pub enum SignalingError {
    /// The connection was never opened, disconnected or reaped
    #[error("Unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// The signaling core rejected the operation
    #[error("Relay error: {0}")]
    Relay(RelayError),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The state file could not be read or written
    #[error("State file error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RelayError> for SignalingError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::UnknownConnection(id) => Self::UnknownConnection(id),
            other => Self::Relay(other),
        }
    }
}

/// Errors from client requests
#[derive(Error, Debug)]
pub enum ClientRequestError {
    /// The `x-connection-id` header was absent or not valid text
    #[error("Missing or invalid X-Connection-Id header")]
    MissingConnectionId,

    /// The request body could not be read
    #[error("Failed to read body: {0}")]
    Body(String),

    /// The body was not a known client event
    #[error("Invalid request: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Errors reading [`ServerConfig`](crate::config::ServerConfig) from the environment
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}
