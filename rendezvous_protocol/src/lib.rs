//! Wire types for the rendezvous signaling relay
//!
//! Every message on the wire is a JSON object naming the event and carrying its
//! payload:
//!
//! ```json
//! {"event": "join_room", "data": {"roomId": "lobby"}}
//! ```
//!
//! Clients send [`ClientEvent`]s and receive [`ServerEvent`]s. Payloads of
//! `signal` and `broadcast` are opaque to the relay and forwarded untouched.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

/// Errors decoding or encoding wire messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The message was not valid JSON or did not match any known event
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Identifier the transport assigns to a live connection
///
/// Opaque to the relay. Clients use it as their user id and as the
/// `targetId` of point-to-point signals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Mint a fresh id from a random UUID
    pub fn random() -> Self {
        Uuid::new_v4().into()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Uuid> for ConnectionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-chosen room name
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Events sent by a client to the relay
///
/// Fields the relay validates itself are optional here, so a request with a
/// missing `roomId` still reaches the router and is answered with an `error`
/// event instead of being rejected as malformed JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    JoinRoom {
        #[serde(default)]
        room_id: Option<RoomId>,
    },
    /// Leaves `room_id`, or the current room when absent
    LeaveRoom {
        #[serde(default)]
        room_id: Option<RoomId>,
    },
    /// Point-to-point negotiation message for a single peer
    Signal {
        #[serde(default)]
        target_id: Option<ConnectionId>,
        #[serde(default)]
        signal: Value,
    },
    /// Room-wide message for every other member of the sender's room
    Broadcast {
        #[serde(default)]
        data: Value,
    },
}

impl FromStr for ClientEvent {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Events the relay delivers to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// A recoverable request error; the connection stays open
    Error { message: String },
    UserJoined {
        user_id: ConnectionId,
        user_count: usize,
    },
    /// Full membership of the room just joined, in join order
    RoomUsers {
        users: Vec<ConnectionId>,
        user_count: usize,
    },
    UserLeft { user_id: ConnectionId },
    UserDisconnected { user_id: ConnectionId },
    Signal { user_id: ConnectionId, signal: Value },
    Broadcast { user_id: ConnectionId, data: Value },
}

impl ServerEvent {
    /// The wire name of this event
    pub fn name(&self) -> &'static str {
        match self {
            Self::Error { .. } => "error",
            Self::UserJoined { .. } => "user_joined",
            Self::RoomUsers { .. } => "room_users",
            Self::UserLeft { .. } => "user_left",
            Self::UserDisconnected { .. } => "user_disconnected",
            Self::Signal { .. } => "signal",
            Self::Broadcast { .. } => "broadcast",
        }
    }
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl FromStr for ServerEvent {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_room_reads_camel_case_room_id() {
        let event: ClientEvent = r#"{"event":"join_room","data":{"roomId":"r1"}}"#
            .parse()
            .unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinRoom {
                room_id: Some(RoomId::from("r1"))
            }
        );
    }

    #[test]
    fn missing_optional_fields_still_decode() {
        let join: ClientEvent = r#"{"event":"join_room","data":{}}"#.parse().unwrap();
        assert_eq!(join, ClientEvent::JoinRoom { room_id: None });

        let leave: ClientEvent = r#"{"event":"leave_room","data":{}}"#.parse().unwrap();
        assert_eq!(leave, ClientEvent::LeaveRoom { room_id: None });

        let broadcast: ClientEvent = r#"{"event":"broadcast","data":{}}"#.parse().unwrap();
        assert_eq!(broadcast, ClientEvent::Broadcast { data: Value::Null });
    }

    #[test]
    fn signal_payload_is_kept_verbatim() {
        let event: ClientEvent =
            r#"{"event":"signal","data":{"targetId":"b","signal":{"type":"offer","sdp":"v=0"}}}"#
                .parse()
                .unwrap();
        assert_eq!(
            event,
            ClientEvent::Signal {
                target_id: Some(ConnectionId::from("b")),
                signal: json!({"type": "offer", "sdp": "v=0"}),
            }
        );
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!("{\"event\":\"shout\",\"data\":{}}".parse::<ClientEvent>().is_err());
        assert!("not json".parse::<ClientEvent>().is_err());
    }

    #[test]
    fn server_events_use_wire_field_names() {
        let joined = ServerEvent::UserJoined {
            user_id: "a".into(),
            user_count: 2,
        };
        assert_eq!(
            serde_json::to_value(&joined).unwrap(),
            json!({"event": "user_joined", "data": {"userId": "a", "userCount": 2}})
        );

        let users = ServerEvent::RoomUsers {
            users: vec!["a".into(), "b".into()],
            user_count: 2,
        };
        assert_eq!(
            serde_json::to_value(&users).unwrap(),
            json!({"event": "room_users", "data": {"users": ["a", "b"], "userCount": 2}})
        );

        let error = ServerEvent::Error {
            message: "Room ID is required".to_string(),
        };
        assert_eq!(
            error.to_string(),
            r#"{"event":"error","data":{"message":"Room ID is required"}}"#
        );
    }

    #[test]
    fn event_name_matches_serialized_tag() {
        let event = ServerEvent::Broadcast {
            user_id: "a".into(),
            data: json!({"x": 1}),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], event.name());
    }

    #[test]
    fn random_ids_are_distinct() {
        assert_ne!(ConnectionId::random(), ConnectionId::random());
    }
}
