//! WebSocket gateway — the transport feeding the relay core.
//!
//! ## Connection lifecycle
//!
//! 1. Client connects to `GET /api/gateway?token=<service_key>` with the
//!    identity headers set by the upstream gateway — the token is validated
//!    before the upgrade completes.
//! 2. A fresh connection handle is generated and bound in the connection
//!    directory (the connection-open notification). A reconnect simply
//!    rebinds; the old socket's handle goes stale and its close notification
//!    later unbinds whatever is current (accepted last-write-wins window).
//! 3. All messages are JSON objects with a `"type"` field.
//! 4. On disconnect the handle is removed and the identity unbound (the
//!    connection-close notification).
//!
//! ## Message types (client → server)
//!
//! | Type             | Fields              | Effect                                  |
//! |------------------|---------------------|-----------------------------------------|
//! | `heartbeat`      | —                   | liveness touch + binding re-upsert      |
//! | `ping`           | —                   | `pong` ack to this connection           |
//! | `match-init`     | `payload` (opaque)  | blind relay, routed on `target_user_id` |
//! | `match-response` | `payload` (opaque)  | blind relay, routed on `initiator_id`   |
//! | `match-result`   | `payload` (opaque)  | blind relay, routed on `initiator_id`   |
//!
//! ## Message types (server → client)
//!
//! Every outbound event is `{"type": <event>, "payload": {...}}` — the
//! directed `chat-*` family, the forwarded `match-*` payloads, and `pong`.
//!
//! Failures on any of these paths are logged drops; there is no caller to
//! answer on a fire-and-forget channel.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, RwLock};
use tracing::{info, info_span, warn, Instrument};

use crate::auth::CallerIdentity;
use crate::identity::Identity;
use crate::relay::events::opaque_routing_field;
use crate::relay::Outbound;
use crate::util::epoch_ms;
use crate::AppState;

/// Outbound channel capacity per connection; events beyond it are dropped
/// under backpressure rather than stalling the relay.
const SEND_QUEUE_SIZE: usize = 256;

/// Local map of connection handle → outbound channel.
///
/// The production implementation of the relay's outbound primitive. The
/// directory may hold bindings for handles that are not in this map (a
/// crashed instance's leftovers until their TTL fires); sends to those are
/// dropped with a log line, which is all best-effort delivery promises.
#[derive(Clone, Default)]
pub struct GatewayConnections {
    inner: Arc<RwLock<HashMap<String, mpsc::Sender<Value>>>>,
}

impl GatewayConnections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently attached connections.
    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }

    async fn attach(&self, handle: &str, tx: mpsc::Sender<Value>) {
        self.inner.write().await.insert(handle.to_string(), tx);
    }

    async fn detach(&self, handle: &str) {
        self.inner.write().await.remove(handle);
    }
}

#[async_trait]
impl Outbound for GatewayConnections {
    async fn send_event(&self, handle: &str, event: &str, payload: Value) {
        let connections = self.inner.read().await;
        let Some(tx) = connections.get(handle) else {
            warn!(handle = %handle, event, "No local connection for handle, dropping event");
            return;
        };
        let msg = json!({ "type": event, "payload": payload });
        if tx.try_send(msg).is_err() {
            warn!(handle = %handle, event, "Client backpressure, dropping event");
        }
    }
}

/// Query parameters for the WebSocket upgrade request.
#[derive(Deserialize)]
pub struct GatewayQuery {
    /// Service key passed as a query parameter (HTTP headers aren't
    /// available during a browser WebSocket upgrade).
    pub token: String,
}

/// `GET /api/gateway?token=<key>` — WebSocket upgrade handler.
///
/// Validates the token and the identity headers before upgrading. Returns
/// `403 Forbidden` on auth failure.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    CallerIdentity(identity): CallerIdentity,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    if !crate::auth::constant_time_eq(
        state.config.auth.service_key.as_bytes(),
        query.token.as_bytes(),
    ) {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    let span = info_span!("gateway", user_id = identity.id, tenant = %identity.tenant);
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity).instrument(span))
}

/// Main per-connection event loop.
///
/// Splits the socket into a sink (outgoing) and stream (incoming); outgoing
/// events are funneled through an mpsc channel so relay calls from other
/// tasks can send without holding the socket.
async fn handle_socket(
    socket: axum::extract::ws::WebSocket,
    state: AppState,
    identity: Identity,
) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let handle = uuid::Uuid::new_v4().to_string();
    let (tx, mut rx) = mpsc::channel::<Value>(SEND_QUEUE_SIZE);

    state.connections.attach(&handle, tx).await;

    // Connection-open notification. A store failure here leaves the user
    // unreachable for directed sends until the next heartbeat rebinds —
    // logged, not fatal to the socket.
    if let Err(e) = state.directory.bind(identity.id, &handle).await {
        warn!(error = %e, "Failed to bind connection");
    }
    info!(handle = %handle, "Connection opened");

    // Task: forward channel messages to the WebSocket sink
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = serde_json::to_string(&msg).expect("Value serializes");
            if ws_sink
                .send(axum::extract::ws::Message::Text(text.into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            axum::extract::ws::Message::Text(text) => {
                let Ok(parsed) = serde_json::from_str::<Value>(&text) else {
                    warn!("Unparseable gateway message, dropping");
                    continue;
                };
                let msg_type = parsed["type"].as_str().unwrap_or("");

                match msg_type {
                    "heartbeat" => {
                        // Liveness signal: record last-seen and re-upsert the
                        // binding, which both refreshes its TTL and restores
                        // it after a lost unbind race.
                        if let Err(e) =
                            state.liveness.touch(Some(identity.id), epoch_ms()).await
                        {
                            warn!(error = %e, "Failed to record heartbeat");
                        }
                        if let Err(e) = state.directory.bind(identity.id, &handle).await {
                            warn!(error = %e, "Failed to refresh binding");
                        }
                    }
                    "ping" => {
                        state.relay.respond_to_probe(&handle).await;
                    }
                    t if opaque_routing_field(t).is_some() => {
                        state
                            .relay
                            .relay_opaque(&identity, t, parsed["payload"].clone())
                            .await;
                    }
                    _ => {
                        warn!(msg_type, "Unknown gateway message type");
                    }
                }
            }
            axum::extract::ws::Message::Close(_) => break,
            _ => {}
        }
    }

    // Connection-close notification. Unbind is unconditional: if a
    // reconnect already superseded this handle, the newer binding is
    // deleted too and the next heartbeat restores it.
    state.connections.detach(&handle).await;
    if let Err(e) = state.directory.unbind(identity.id).await {
        warn!(error = %e, "Failed to unbind connection");
    }
    send_task.abort();
    info!(handle = %handle, "Connection closed");
}
