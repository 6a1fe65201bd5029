//! HTTP long-polling handlers for the WASM signaling relay
//!
//! Requests are first reduced to an [`Inbound`] and answered by [`route`],
//! which knows nothing about the WASI host. [`handle_request`] is the thin
//! `wstd` adapter around it.

use crate::{
    error::{ClientRequestError, SignalingError},
    state::ServerState,
};
use rendezvous_protocol::{ClientEvent, ConnectionId, ServerEvent};
use serde::Serialize;
use std::{str::FromStr, time::SystemTime};
use tracing::{debug, error, warn};
use wstd::http::{Body, Method, Request, Response};

/// Header carrying the sender's connection id on POST requests
pub const CONNECTION_HEADER: &str = "x-connection-id";

const BANNER: &str = concat!(
    "WebRTC Signaling Server\n",
    "\n",
    "Endpoints:\n",
    "- GET /health - Health check\n",
    "- GET /poll?connection_id={id} - Connect, or poll for queued events\n",
    "- POST /emit - Send an event (X-Connection-Id header required)\n",
    "- POST /disconnect - Close the connection (X-Connection-Id header required)\n",
    "\n",
    "Events sent to /emit:\n",
    r#"- {"event":"join_room","data":{"roomId":"..."}}"#,
    "\n",
    r#"- {"event":"leave_room","data":{}}"#,
    "\n",
    r#"- {"event":"signal","data":{"targetId":"...","signal":...}}"#,
    "\n",
    r#"- {"event":"broadcast","data":{"data":...}}"#,
    "\n",
    "\n",
    r#"Poll response: {"connection_id": "...", "events": [...]}"#,
    "\n",
);

/// A request with everything the router needs already extracted
#[derive(Debug)]
pub struct Inbound<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub connection_id: Option<&'a str>,
    pub body: &'a str,
}

/// A response before it is handed to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    pub preflight: bool,
}

impl Reply {
    fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.into(),
            preflight: false,
        }
    }

    fn json(body: String) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            body,
            preflight: false,
        }
    }

    fn preflight() -> Self {
        Self {
            status: 204,
            content_type: "text/plain",
            body: String::new(),
            preflight: true,
        }
    }

    fn ok() -> Self {
        Self::text(200, "OK")
    }
}

#[derive(Serialize)]
struct PollResponse {
    connection_id: ConnectionId,
    events: Vec<ServerEvent>,
}

/// Get query parameter from URI
fn get_query_param<'a>(query: Option<&'a str>, key: &str) -> Option<&'a str> {
    query?.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key && !v.is_empty()).then_some(v)
    })
}

fn sender(inbound: &Inbound<'_>) -> Result<ConnectionId, ClientRequestError> {
    inbound
        .connection_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ConnectionId::from)
        .ok_or(ClientRequestError::MissingConnectionId)
}

fn relay_failure(err: SignalingError) -> Reply {
    match err {
        SignalingError::UnknownConnection(_) => Reply::text(404, "Connection not found"),
        other => {
            error!(error = %other, "Relay failure");
            Reply::text(500, "Internal Server Error")
        }
    }
}

fn handle_poll(inbound: &Inbound<'_>, state: &ServerState, now: SystemTime) -> Reply {
    let id = get_query_param(inbound.query, "connection_id").map(ConnectionId::from);
    let (connection_id, events) = match state.connect_or_poll(id, now) {
        Ok(polled) => polled,
        Err(err) => return relay_failure(err),
    };
    match serde_json::to_string(&PollResponse {
        connection_id,
        events,
    }) {
        Ok(body) => Reply::json(body),
        Err(err) => relay_failure(err.into()),
    }
}

fn handle_emit(inbound: &Inbound<'_>, state: &ServerState, now: SystemTime) -> Reply {
    let parsed = sender(inbound).and_then(|sender| {
        let event = ClientEvent::from_str(inbound.body)?;
        Ok((sender, event))
    });
    let (sender, event) = match parsed {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!(error = %err, "Bad emit request");
            return Reply::text(400, err.to_string());
        }
    };

    match state.dispatch(&sender, event, now) {
        Ok(()) => Reply::ok(),
        Err(err) => relay_failure(err),
    }
}

fn handle_disconnect(inbound: &Inbound<'_>, state: &ServerState) -> Reply {
    let sender = match sender(inbound) {
        Ok(sender) => sender,
        Err(err) => return Reply::text(400, err.to_string()),
    };
    match state.disconnect(&sender) {
        Ok(()) => Reply::ok(),
        Err(err) => relay_failure(err),
    }
}

/// Answer one request.
///
/// The relay state is loaded before and saved after, and idle connections
/// are reaped first.
pub fn route(inbound: &Inbound<'_>, state: &ServerState, now: SystemTime) -> Reply {
    if *inbound.method == Method::OPTIONS {
        return Reply::preflight();
    }

    state.load();
    state.reap_idle(now);

    let reply = match (inbound.method, inbound.path) {
        (&Method::GET, "/health") => Reply::ok(),
        (&Method::GET, "/") => Reply::text(200, BANNER),
        (&Method::GET, "/poll") => handle_poll(inbound, state, now),
        (&Method::POST, "/emit") => handle_emit(inbound, state, now),
        (&Method::POST, "/disconnect") => handle_disconnect(inbound, state),
        _ => Reply::text(404, "Not Found"),
    };

    if let Err(err) = state.save() {
        warn!(error = %err, "Failed to save relay state");
    }
    reply
}

fn respond(reply: Reply) -> Response<Body> {
    let mut builder = Response::builder()
        .status(reply.status)
        .header("access-control-allow-origin", "*");
    if reply.preflight {
        builder = builder
            .header("access-control-allow-methods", "GET, POST, OPTIONS")
            .header(
                "access-control-allow-headers",
                "content-type, x-connection-id",
            )
            .header("access-control-max-age", "86400");
    } else {
        builder = builder.header("content-type", reply.content_type);
    }
    builder
        .body(Body::from(reply.body))
        .expect("static status and headers are valid")
}

/// Handle an HTTP request - main entry from the WASI host
pub async fn handle_request(
    request: Request<Body>,
    state: &ServerState,
) -> Result<Response<Body>, wstd::http::Error> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let connection_id = request
        .headers()
        .get(CONNECTION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = if method == Method::POST {
        let mut body = request.into_body();
        match body.str_contents().await {
            Ok(s) => s.to_string(),
            Err(e) => {
                let err = ClientRequestError::Body(format!("{e:?}"));
                return Ok(respond(Reply::text(400, err.to_string())));
            }
        }
    } else {
        String::new()
    };

    let inbound = Inbound {
        method: &method,
        path: uri.path(),
        query: uri.query(),
        connection_id: connection_id.as_deref(),
        body: &body,
    };
    Ok(respond(route(&inbound, state, SystemTime::now())))
}
