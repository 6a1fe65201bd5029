//! WASI HTTP server entry point for the long-polling signaling relay
//!
//! This module provides the main entry point when running as a WASI HTTP component
//! using `wasmtime serve`.

use rendezvous_server_wasm::{ServerConfig, ServerState, handle_request};
use std::cell::RefCell;
use tracing_subscriber::EnvFilter;
use wstd::http::{Body, Request, Response};

// Thread-local state for the server (WASI is single-threaded). Each request
// reloads it from the state file, so a host that starts a fresh instance per
// request sees the same relay.
thread_local! {
    static STATE: RefCell<Option<ServerState>> = const { RefCell::new(None) };
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    // Fails if a subscriber is already installed, which is fine
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

fn get_or_init_state() -> ServerState {
    STATE.with(|s| {
        s.borrow_mut()
            .get_or_insert_with(|| {
                let config = ServerConfig::from_env();
                let filter = config
                    .as_ref()
                    .map_or("info", |config| config.log_filter.as_str())
                    .to_string();
                init_logging(&filter);

                let config = config.unwrap_or_else(|err| {
                    tracing::error!(error = %err, "Invalid configuration, using defaults");
                    ServerConfig::default()
                });
                tracing::info!(
                    idle_timeout_secs = config.idle_timeout.as_secs(),
                    max_queued_events = config.max_queued_events,
                    state_file = ?config.state_file,
                    "Signaling relay ready"
                );
                ServerState::new(config)
            })
            .clone()
    })
}

/// The main HTTP handler for WASI
///
/// This function is called by the WASI runtime for each incoming HTTP request.
#[wstd::http_server]
async fn main(request: Request<Body>) -> Result<Response<Body>, wstd::http::Error> {
    let state = get_or_init_state();
    handle_request(request, &state).await
}
