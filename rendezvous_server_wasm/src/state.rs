//! Server state for the WASM signaling relay
//!
//! Ties the signaling core to the long-polling transport: every connection
//! has a [`Mailbox`](crate::mailbox::Mailboxes) the router delivers into, and
//! connections that stop polling are disconnected.
//!
//! `wasmtime serve` may hand each request to a fresh instance, so the tables
//! and mailboxes are persisted to a JSON file between requests when a state
//! file is configured. Instances racing on the same file are not serialized;
//! the last save wins.

use crate::{
    config::ServerConfig,
    error::SignalingError,
    mailbox::{Mailbox, Mailboxes},
};
use rendezvous_protocol::{ClientEvent, ConnectionId, ServerEvent};
use rendezvous_signaling::{RelayState, RelayStats, Router, Tables};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, io, sync::Arc, time::SystemTime};
use tracing::{debug, warn};

/// Everything that has to outlive a single request
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    tables: Tables,
    mailboxes: HashMap<ConnectionId, Mailbox>,
}

/// Cheap to clone handle to the relay
#[derive(Clone)]
pub struct ServerState {
    router: Arc<Router<Arc<Mailboxes>>>,
    mailboxes: Arc<Mailboxes>,
    config: Arc<ServerConfig>,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        let mailboxes = Arc::new(Mailboxes::new(config.max_queued_events));
        let router = Router::new(Arc::new(RelayState::new()), Arc::clone(&mailboxes));
        Self {
            router: Arc::new(router),
            mailboxes,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn stats(&self) -> RelayStats {
        self.router.state().stats()
    }

    /// Replace the in-memory state with the contents of the state file.
    ///
    /// A missing file means an empty relay; an unreadable one is logged and
    /// treated the same way.
    pub fn load(&self) {
        let Some(path) = &self.config.state_file else {
            return;
        };
        let snapshot = match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(path = %path.display(), error = %err, "Corrupt state file, starting empty");
                Snapshot::default()
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Snapshot::default(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Cannot read state file, starting empty");
                Snapshot::default()
            }
        };
        self.router.state().restore(snapshot.tables);
        self.mailboxes.restore(snapshot.mailboxes);
    }

    /// Write the in-memory state to the state file, if one is configured
    pub fn save(&self) -> Result<(), SignalingError> {
        let Some(path) = &self.config.state_file else {
            return Ok(());
        };
        let snapshot = Snapshot {
            tables: self.router.state().snapshot(),
            mailboxes: self.mailboxes.snapshot(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
        Ok(())
    }

    /// Open a new connection with an empty mailbox
    pub fn connect(&self, now: SystemTime) -> Result<ConnectionId, SignalingError> {
        let id = ConnectionId::random();
        self.mailboxes.open(id.clone(), now);
        if let Err(err) = self.router.connect(id.clone()) {
            self.mailboxes.close(&id);
            return Err(err.into());
        }
        Ok(id)
    }

    /// Drain the events queued for `id`.
    ///
    /// Without an id, or with one the relay no longer knows, a fresh
    /// connection is opened instead.
    pub fn connect_or_poll(
        &self,
        id: Option<ConnectionId>,
        now: SystemTime,
    ) -> Result<(ConnectionId, Vec<ServerEvent>), SignalingError> {
        if let Some(id) = id {
            if let Some(events) = self.mailboxes.drain(&id, now) {
                return Ok((id, events));
            }
            debug!(connection_id = %id, "Poll from unknown connection, opening a new one");
        }
        Ok((self.connect(now)?, Vec::new()))
    }

    /// Route an inbound event from `sender`
    pub fn dispatch(
        &self,
        sender: &ConnectionId,
        event: ClientEvent,
        now: SystemTime,
    ) -> Result<(), SignalingError> {
        if !self.mailboxes.touch(sender, now) {
            return Err(SignalingError::UnknownConnection(sender.clone()));
        }
        self.router.dispatch(sender, event)?;
        Ok(())
    }

    pub fn disconnect(&self, id: &ConnectionId) -> Result<(), SignalingError> {
        let result = self.router.disconnect(id);
        self.mailboxes.close(id);
        result.map_err(SignalingError::from)
    }

    /// Disconnect every connection idle for longer than the configured timeout.
    ///
    /// Returns how many were reaped.
    pub fn reap_idle(&self, now: SystemTime) -> usize {
        let idle = self.mailboxes.idle(now, self.config.idle_timeout);
        for id in &idle {
            warn!(connection_id = %id, "Connection idle, disconnecting");
            if let Err(err) = self.disconnect(id) {
                debug!(connection_id = %id, error = %err, "Idle connection already gone");
            }
        }
        idle.len()
    }
}
