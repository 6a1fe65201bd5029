//! Outbound seam to the transport

use rendezvous_protocol::{ConnectionId, ServerEvent};
use std::sync::Arc;

/// Delivers outbound events to a single connection.
///
/// Delivery is fire-and-forget: implementations queue the event and return
/// immediately. The router calls `emit` while holding the relay lock, so an
/// implementation must never block on the peer or call back into the router.
/// Events for connections the transport no longer knows are dropped.
pub trait Emitter {
    fn emit(&self, to: &ConnectionId, event: &ServerEvent);
}

impl<E: Emitter + ?Sized> Emitter for Arc<E> {
    fn emit(&self, to: &ConnectionId, event: &ServerEvent) {
        (**self).emit(to, event);
    }
}

impl<E: Emitter + ?Sized> Emitter for &E {
    fn emit(&self, to: &ConnectionId, event: &ServerEvent) {
        (**self).emit(to, event);
    }
}
