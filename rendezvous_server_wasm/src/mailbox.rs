//! Per-connection outbound queues
//!
//! With long polling nothing can be pushed to a client, so every event the
//! router emits is parked in the recipient's mailbox until its next poll.
//! Mailboxes are bounded: a peer that stops polling loses its oldest events
//! instead of growing without limit, and never slows down anyone else.

use parking_lot::Mutex;
use rendezvous_protocol::{ConnectionId, ServerEvent};
use rendezvous_signaling::Emitter;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::warn;

/// Milliseconds since the Unix epoch, saturating at zero before it
pub(crate) fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map_or(0, |since| since.as_millis() as u64)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Mailbox {
    events: VecDeque<ServerEvent>,
    /// Last poll or emit from this connection, wall clock so it can be saved
    last_seen_ms: u64,
}

#[derive(Debug)]
pub struct Mailboxes {
    boxes: Mutex<HashMap<ConnectionId, Mailbox>>,
    capacity: usize,
}

impl Mailboxes {
    pub fn new(capacity: usize) -> Self {
        Self {
            boxes: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn open(&self, id: ConnectionId, now: SystemTime) {
        self.boxes.lock().insert(
            id,
            Mailbox {
                events: VecDeque::new(),
                last_seen_ms: unix_millis(now),
            },
        );
    }

    /// Drop a mailbox and anything still queued in it
    pub fn close(&self, id: &ConnectionId) -> bool {
        self.boxes.lock().remove(id).is_some()
    }

    /// Take every queued event and mark the connection as seen
    pub fn drain(&self, id: &ConnectionId, now: SystemTime) -> Option<Vec<ServerEvent>> {
        let mut boxes = self.boxes.lock();
        let mailbox = boxes.get_mut(id)?;
        mailbox.last_seen_ms = unix_millis(now);
        Some(mailbox.events.drain(..).collect())
    }

    pub fn touch(&self, id: &ConnectionId, now: SystemTime) -> bool {
        match self.boxes.lock().get_mut(id) {
            Some(mailbox) => {
                mailbox.last_seen_ms = unix_millis(now);
                true
            }
            None => false,
        }
    }

    /// Connections not seen for longer than `timeout`
    pub fn idle(&self, now: SystemTime, timeout: Duration) -> Vec<ConnectionId> {
        let now_ms = unix_millis(now);
        let timeout_ms = timeout.as_millis() as u64;
        self.boxes
            .lock()
            .iter()
            .filter(|(_, mailbox)| now_ms.saturating_sub(mailbox.last_seen_ms) > timeout_ms)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub(crate) fn snapshot(&self) -> HashMap<ConnectionId, Mailbox> {
        self.boxes.lock().clone()
    }

    pub(crate) fn restore(&self, snapshot: HashMap<ConnectionId, Mailbox>) {
        *self.boxes.lock() = snapshot;
    }
}

impl Emitter for Mailboxes {
    fn emit(&self, to: &ConnectionId, event: &ServerEvent) {
        let mut boxes = self.boxes.lock();
        let Some(mailbox) = boxes.get_mut(to) else {
            return;
        };
        if mailbox.events.len() >= self.capacity {
            if let Some(dropped) = mailbox.events.pop_front() {
                warn!(
                    connection_id = %to,
                    capacity = self.capacity,
                    dropped = dropped.name(),
                    "Mailbox full, dropping oldest event"
                );
            }
        }
        mailbox.events.push_back(event.clone());
    }
}
