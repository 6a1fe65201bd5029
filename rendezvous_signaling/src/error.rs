//! Error types for the signaling core

use rendezvous_protocol::{ConnectionId, RoomId};
use thiserror::Error;

/// Errors raised by the registry, the room table and the router
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// A required field was missing or empty; reported back to the sender
    #[error("{0}")]
    InvalidRequest(String),

    /// The connection is not registered (already disconnected or never seen)
    #[error("Unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// The transport handed out an id that is already live
    #[error("Connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    /// Registry and room table disagree about a room
    #[error("Inconsistent state for room {room}: {detail}")]
    Inconsistent { room: RoomId, detail: String },
}
