//! Signaling core for the rendezvous relay
//!
//! Peers connect, join named rooms and exchange opaque negotiation messages
//! through the relay. This crate holds the part that decides who receives
//! what:
//!
//! - [`ConnectionRegistry`] tracks live connections and their room
//! - [`RoomTable`] tracks room membership in join order
//! - [`RelayState`] owns both behind a single lock
//! - [`Router`] applies lifecycle and client events and fans out
//!   [`ServerEvent`](rendezvous_protocol::ServerEvent)s through an [`Emitter`]
//!
//! The transport is not part of this crate. It assigns connection ids, feeds
//! inbound events to the router and implements [`Emitter`].
//!
//! ```
//! use std::sync::Arc;
//! use rendezvous_protocol::{ClientEvent, ConnectionId, ServerEvent};
//! use rendezvous_signaling::{Emitter, RelayState, Router};
//!
//! struct Print;
//!
//! impl Emitter for Print {
//!     fn emit(&self, to: &ConnectionId, event: &ServerEvent) {
//!         println!("{to} <- {event}");
//!     }
//! }
//!
//! let router = Router::new(Arc::new(RelayState::new()), Print);
//! let alice = ConnectionId::random();
//! router.connect(alice.clone()).unwrap();
//! router
//!     .dispatch(&alice, ClientEvent::JoinRoom { room_id: Some("lobby".into()) })
//!     .unwrap();
//! assert_eq!(router.state().room_members(&"lobby".into()), vec![alice]);
//! ```

#![forbid(unsafe_code)]

pub mod emitter;
pub mod error;
pub mod registry;
pub mod rooms;
pub mod router;
pub mod state;

pub use emitter::Emitter;
pub use error::RelayError;
pub use registry::{Connection, ConnectionRegistry};
pub use rooms::{JoinOutcome, LeaveOutcome, Room, RoomTable};
pub use router::Router;
pub use state::{RelayState, RelayStats, Tables};
