//! Signaling router
//!
//! Handles connection lifecycle and inbound client events, updating the
//! [`RelayState`] and fanning out [`ServerEvent`]s through an [`Emitter`].
//!
//! Each connection moves through `Connected -> Joined -> Disconnected` and is
//! in at most one room at a time. Joining another room first leaves the
//! current one.
//!
//! All work for one event happens inside a single [`RelayState::with`] call,
//! including emission, so every member of a room sees that room's events in
//! the order the mutations were applied.

use crate::{
    emitter::Emitter,
    error::RelayError,
    rooms::LeaveOutcome,
    state::{RelayState, Tables},
};
use rendezvous_protocol::{ClientEvent, ConnectionId, RoomId, ServerEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

const ROOM_ID_REQUIRED: &str = "Room ID is required";

pub struct Router<E> {
    state: Arc<RelayState>,
    emitter: E,
}

impl<E: Emitter> Router<E> {
    pub fn new(state: Arc<RelayState>, emitter: E) -> Self {
        Self { state, emitter }
    }

    pub fn state(&self) -> &Arc<RelayState> {
        &self.state
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    /// Register a connection reported by the transport
    pub fn connect(&self, id: ConnectionId) -> Result<(), RelayError> {
        self.state
            .with(|tables| tables.connections.register(id.clone()))?;
        info!(connection_id = %id, "Client connected");
        Ok(())
    }

    /// Remove a connection, notifying whoever is left in its room
    pub fn disconnect(&self, id: &ConnectionId) -> Result<(), RelayError> {
        let room = self.state.with(|tables| {
            let room = current_room(tables, id)?;
            if let Some(room_id) = &room {
                self.depart(
                    tables,
                    id,
                    room_id,
                    ServerEvent::UserDisconnected {
                        user_id: id.clone(),
                    },
                );
            }
            tables.connections.unregister(id);
            Ok::<_, RelayError>(room)
        })?;

        info!(connection_id = %id, room_id = ?room, "Client disconnected");
        Ok(())
    }

    /// Handle one inbound event from `sender`.
    ///
    /// Invalid requests are answered with an `error` event and do not fail;
    /// the only error returned is an unregistered sender.
    pub fn dispatch(&self, sender: &ConnectionId, event: ClientEvent) -> Result<(), RelayError> {
        let result = match event {
            ClientEvent::JoinRoom { room_id } => self.join_room(sender, room_id),
            ClientEvent::LeaveRoom { room_id } => self.leave_room(sender, room_id),
            ClientEvent::Signal { target_id, signal } => self.signal(sender, target_id, signal),
            ClientEvent::Broadcast { data } => self.broadcast(sender, data),
        };

        match result {
            Err(RelayError::InvalidRequest(message)) => {
                debug!(connection_id = %sender, %message, "Rejected request");
                self.emitter.emit(sender, &ServerEvent::Error { message });
                Ok(())
            }
            other => other,
        }
    }

    fn join_room(&self, sender: &ConnectionId, room_id: Option<RoomId>) -> Result<(), RelayError> {
        let Some(room_id) = room_id.filter(|room| !room.is_empty()) else {
            return Err(RelayError::InvalidRequest(ROOM_ID_REQUIRED.to_string()));
        };

        self.state.with(|tables| -> Result<(), RelayError> {
            let previous = current_room(tables, sender)?;
            if let Some(previous) = previous.filter(|previous| *previous != room_id) {
                debug!(connection_id = %sender, room_id = %previous, "Leaving previous room");
                self.depart(
                    tables,
                    sender,
                    &previous,
                    ServerEvent::UserLeft {
                        user_id: sender.clone(),
                    },
                );
            }

            let outcome = tables.rooms.join(&room_id, sender);
            if let Some(connection) = tables.connections.lookup_mut(sender) {
                connection.room = Some(room_id.clone());
            }
            if !self.verify(tables, &room_id) {
                return Ok(());
            }

            let user_count = outcome.user_count();
            if outcome.added {
                info!(connection_id = %sender, room_id = %room_id, user_count, "Joined room");
                self.emit_each(
                    &outcome.members,
                    &ServerEvent::UserJoined {
                        user_id: sender.clone(),
                        user_count,
                    },
                );
            }
            self.emitter.emit(
                sender,
                &ServerEvent::RoomUsers {
                    users: outcome.members,
                    user_count,
                },
            );
            Ok(())
        })
    }

    fn leave_room(&self, sender: &ConnectionId, room_id: Option<RoomId>) -> Result<(), RelayError> {
        self.state.with(|tables| -> Result<(), RelayError> {
            let current = current_room(tables, sender)?;
            let Some(room_id) = room_id.filter(|room| !room.is_empty()).or(current) else {
                return Ok(());
            };

            let left = self.depart(
                tables,
                sender,
                &room_id,
                ServerEvent::UserLeft {
                    user_id: sender.clone(),
                },
            );
            if left {
                info!(connection_id = %sender, room_id = %room_id, "Left room");
            }
            Ok(())
        })
    }

    fn signal(
        &self,
        sender: &ConnectionId,
        target_id: Option<ConnectionId>,
        signal: Value,
    ) -> Result<(), RelayError> {
        self.state.with(|tables| -> Result<(), RelayError> {
            current_room(tables, sender)?;
            match target_id {
                Some(target) if tables.connections.contains(&target) => {
                    self.emitter.emit(
                        &target,
                        &ServerEvent::Signal {
                            user_id: sender.clone(),
                            signal,
                        },
                    );
                }
                target => {
                    debug!(connection_id = %sender, target_id = ?target, "Dropping signal for unknown target");
                }
            }
            Ok(())
        })
    }

    fn broadcast(&self, sender: &ConnectionId, data: Value) -> Result<(), RelayError> {
        self.state.with(|tables| -> Result<(), RelayError> {
            let Some(room_id) = current_room(tables, sender)? else {
                debug!(connection_id = %sender, "Dropping broadcast outside of a room");
                return Ok(());
            };

            let event = ServerEvent::Broadcast {
                user_id: sender.clone(),
                data,
            };
            let others: Vec<ConnectionId> = tables
                .rooms
                .members(&room_id)
                .into_iter()
                .filter(|member| member != sender)
                .collect();
            self.emit_each(&others, &event);
            Ok(())
        })
    }

    /// Take `id` out of `room_id` and tell the remaining members with `notice`.
    ///
    /// Returns whether a membership was actually removed.
    fn depart(
        &self,
        tables: &mut Tables,
        id: &ConnectionId,
        room_id: &RoomId,
        notice: ServerEvent,
    ) -> bool {
        let mut pointed_here = false;
        if let Some(connection) = tables.connections.lookup_mut(id) {
            if connection.room.as_ref() == Some(room_id) {
                connection.room = None;
                pointed_here = true;
            }
        }

        let outcome = tables.rooms.leave(room_id, id);
        let removed = outcome.removed();
        match outcome {
            LeaveOutcome::NotMember if pointed_here => {
                self.repair(
                    tables,
                    RelayError::Inconsistent {
                        room: room_id.clone(),
                        detail: format!("connection {id} was missing from its room"),
                    },
                );
            }
            LeaveOutcome::NotMember => {}
            LeaveOutcome::Emptied => debug!(room_id = %room_id, "Room closed"),
            LeaveOutcome::Left { remaining } => {
                if self.verify(tables, room_id) {
                    self.emit_each(&remaining, &notice);
                }
            }
        }
        removed
    }

    /// Check `room_id` after a mutation, resetting it if the tables disagree.
    fn verify(&self, tables: &mut Tables, room_id: &RoomId) -> bool {
        match tables.verify_room(room_id) {
            Ok(()) => true,
            Err(err) => {
                self.repair(tables, err);
                false
            }
        }
    }

    fn repair(&self, tables: &mut Tables, err: RelayError) {
        let RelayError::Inconsistent { room, .. } = &err else {
            return;
        };
        let cleared = tables.reset_room(room);
        error!(error = %err, cleared = cleared.len(), "Reset inconsistent room");
    }

    fn emit_each(&self, recipients: &[ConnectionId], event: &ServerEvent) {
        for recipient in recipients {
            self.emitter.emit(recipient, event);
        }
    }
}

fn current_room(tables: &Tables, id: &ConnectionId) -> Result<Option<RoomId>, RelayError> {
    tables
        .connections
        .lookup(id)
        .map(|connection| connection.room.clone())
        .ok_or_else(|| RelayError::UnknownConnection(id.clone()))
}
