//! WASI-compatible WebRTC signaling relay using wstd
//!
//! Peers discover each other in named rooms and exchange opaque negotiation
//! messages (session descriptions, ICE candidates) through this relay. The
//! room and routing logic lives in [`rendezvous_signaling`]; this crate hosts
//! it as a WASI HTTP component speaking HTTP long-polling.
//!
//! # Protocol
//!
//! - **GET /poll** - Open a connection; the response carries its id
//! - **GET /poll?connection_id={id}** - Collect events queued for `id`
//! - **POST /emit** - Send a client event (X-Connection-Id header required)
//! - **POST /disconnect** - Leave for good (X-Connection-Id header required)
//! - **GET /health** - Health check
//!
//! ## Poll response (server → client)
//!
//! ```json
//! {"connection_id": "<id>", "events": [{"event": "user_joined", "data": {"userId": "<id>", "userCount": 2}}]}
//! ```
//!
//! Event names: `error`, `user_joined`, `room_users`, `user_left`,
//! `user_disconnected`, `signal`, `broadcast`.
//!
//! ## Client events (client → server)
//!
//! POST to /emit with the X-Connection-Id header and one of:
//! - `{"event": "join_room", "data": {"roomId": "<room>"}}`
//! - `{"event": "leave_room", "data": {"roomId": "<room>"}}` (`roomId` optional)
//! - `{"event": "signal", "data": {"targetId": "<id>", "signal": ...}}`
//! - `{"event": "broadcast", "data": {"data": ...}}`
//!
//! Connections that neither poll nor emit within the idle timeout are
//! disconnected and their room is told with `user_disconnected`.
//!
//! Relay state is kept in `rendezvous_state.json` (see
//! `RENDEZVOUS_STATE_FILE`) between requests, so the host needs a writable
//! directory preopened with `--dir`.
//!
//! # Example
//!
//! ```bash
//! # Start the server
//! wasmtime serve -S common -S inherit-env --dir . --addr 127.0.0.1:8080 rendezvous-signaling-wasm.wasm
//!
//! # Connect (returns connection_id)
//! curl http://127.0.0.1:8080/poll
//!
//! # Join a room
//! curl -X POST -H "X-Connection-Id: <your-id>" \
//!   -d '{"event":"join_room","data":{"roomId":"lobby"}}' \
//!   http://127.0.0.1:8080/emit
//!
//! # Poll for events
//! curl "http://127.0.0.1:8080/poll?connection_id=<your-id>"
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod handler;
pub mod mailbox;
pub mod state;

pub use config::ServerConfig;
pub use error::{ClientRequestError, ConfigError, SignalingError};
pub use handler::handle_request;
pub use state::ServerState;
