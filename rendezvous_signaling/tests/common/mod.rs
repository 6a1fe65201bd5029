#![allow(dead_code)]

use parking_lot::Mutex;
use rendezvous_protocol::{ClientEvent, ConnectionId, RoomId, ServerEvent};
use rendezvous_signaling::{Emitter, RelayState, Router};
use serde_json::Value;
use std::sync::Arc;

/// Records every emitted event in order
#[derive(Default)]
pub struct Recorder {
    sent: Mutex<Vec<(ConnectionId, ServerEvent)>>,
}

impl Emitter for Recorder {
    fn emit(&self, to: &ConnectionId, event: &ServerEvent) {
        self.sent.lock().push((to.clone(), event.clone()));
    }
}

impl Recorder {
    /// Drain everything recorded so far
    pub fn take(&self) -> Vec<(ConnectionId, ServerEvent)> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Drain and keep only what `to` received
    pub fn take_for(&self, to: &ConnectionId) -> Vec<ServerEvent> {
        self.take()
            .into_iter()
            .filter(|(recipient, _)| recipient == to)
            .map(|(_, event)| event)
            .collect()
    }
}

pub type TestRouter = Router<Arc<Recorder>>;

pub fn router() -> (TestRouter, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let router = Router::new(Arc::new(RelayState::new()), Arc::clone(&recorder));
    (router, recorder)
}

pub fn id(raw: &str) -> ConnectionId {
    ConnectionId::from(raw)
}

pub fn room(raw: &str) -> RoomId {
    RoomId::from(raw)
}

pub fn connect(router: &TestRouter, raw: &str) -> ConnectionId {
    let id = id(raw);
    router.connect(id.clone()).unwrap();
    id
}

pub fn join(router: &TestRouter, who: &ConnectionId, room_id: &str) {
    router
        .dispatch(
            who,
            ClientEvent::JoinRoom {
                room_id: Some(room(room_id)),
            },
        )
        .unwrap();
}

pub fn leave(router: &TestRouter, who: &ConnectionId, room_id: Option<&str>) {
    router
        .dispatch(
            who,
            ClientEvent::LeaveRoom {
                room_id: room_id.map(room),
            },
        )
        .unwrap();
}

pub fn signal(router: &TestRouter, from: &ConnectionId, to: &str, payload: Value) {
    router
        .dispatch(
            from,
            ClientEvent::Signal {
                target_id: Some(id(to)),
                signal: payload,
            },
        )
        .unwrap();
}

pub fn broadcast(router: &TestRouter, from: &ConnectionId, data: Value) {
    router
        .dispatch(from, ClientEvent::Broadcast { data })
        .unwrap();
}

pub fn assert_consistent(router: &TestRouter) {
    if let Err(violations) = router.state().check_invariants() {
        panic!("relay state is inconsistent: {violations:?}");
    }
}
