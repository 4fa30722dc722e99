//! Directed-send endpoints — one thin handler per event kind over the
//! single parameterized relay.
//!
//! | Method | Path                        | Event                 |
//! |--------|-----------------------------|-----------------------|
//! | POST   | `/api/chat/message`         | `chat-message`        |
//! | POST   | `/api/chat/request`         | `chat-request`        |
//! | POST   | `/api/chat/request/ack`     | `chat-request-ack`    |
//! | POST   | `/api/chat/request/accept`  | `chat-request-accept` |
//! | POST   | `/api/chat/request/reject`  | `chat-request-reject` |
//! | POST   | `/api/chat/request/cancel`  | `chat-request-cancel` |
//! | POST   | `/api/chat/delete`          | `chat-delete`         |
//!
//! A 200 here means the event was handed to the transport for the target's
//! currently-bound, currently-live connection — not that it arrived.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::CallerIdentity;
use crate::relay::events::ChatEvent;
use crate::relay::RelayError;
use crate::AppState;

/// Map a relay failure to its HTTP response. The three 404-class misses
/// keep their distinct messages.
fn relay_error(err: RelayError) -> (StatusCode, Json<Value>) {
    (err.status(), Json(json!({"error": err.to_string()})))
}

fn bad_request(message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message})))
}

fn sent() -> Json<Value> {
    Json(json!({"status": "sent"}))
}

/// `{toUserName, message}` — body of a chat message send.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    #[serde(default)]
    pub to_user_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `{toUserName, encryptionData?}` — body of request/accept sends.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    #[serde(default)]
    pub to_user_name: Option<String>,
    /// Opaque client key-exchange blob, forwarded verbatim.
    #[serde(default)]
    pub encryption_data: Option<String>,
}

/// `{toUserName, reason?}` — body of a reject send.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonBody {
    #[serde(default)]
    pub to_user_name: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `{toUserName}` — body of ack/cancel/delete sends.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetBody {
    #[serde(default)]
    pub to_user_name: Option<String>,
}

/// `POST /api/chat/message` — relay a chat message to a named user.
pub async fn send_message(
    State(state): State<AppState>,
    CallerIdentity(sender): CallerIdentity,
    Json(body): Json<MessageBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(message) = body.message else {
        return Err(bad_request("message is required"));
    };
    state
        .relay
        .send_directed(
            &sender,
            body.to_user_name.as_deref().unwrap_or(""),
            ChatEvent::Message,
            Some(&message),
        )
        .await
        .map_err(relay_error)?;
    Ok(sent())
}

/// `POST /api/chat/request` — open a chat request.
pub async fn send_request(
    State(state): State<AppState>,
    CallerIdentity(sender): CallerIdentity,
    Json(body): Json<RequestBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .relay
        .send_directed(
            &sender,
            body.to_user_name.as_deref().unwrap_or(""),
            ChatEvent::Request,
            body.encryption_data.as_deref(),
        )
        .await
        .map_err(relay_error)?;
    Ok(sent())
}

/// `POST /api/chat/request/ack` — acknowledge a chat request.
pub async fn send_request_ack(
    State(state): State<AppState>,
    CallerIdentity(sender): CallerIdentity,
    Json(body): Json<TargetBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .relay
        .send_directed(
            &sender,
            body.to_user_name.as_deref().unwrap_or(""),
            ChatEvent::RequestAck,
            None,
        )
        .await
        .map_err(relay_error)?;
    Ok(sent())
}

/// `POST /api/chat/request/accept` — accept a chat request.
pub async fn send_request_accept(
    State(state): State<AppState>,
    CallerIdentity(sender): CallerIdentity,
    Json(body): Json<RequestBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .relay
        .send_directed(
            &sender,
            body.to_user_name.as_deref().unwrap_or(""),
            ChatEvent::RequestAccept,
            body.encryption_data.as_deref(),
        )
        .await
        .map_err(relay_error)?;
    Ok(sent())
}

/// `POST /api/chat/request/reject` — reject a chat request.
pub async fn send_request_reject(
    State(state): State<AppState>,
    CallerIdentity(sender): CallerIdentity,
    Json(body): Json<ReasonBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .relay
        .send_directed(
            &sender,
            body.to_user_name.as_deref().unwrap_or(""),
            ChatEvent::RequestReject,
            body.reason.as_deref(),
        )
        .await
        .map_err(relay_error)?;
    Ok(sent())
}

/// `POST /api/chat/request/cancel` — withdraw a chat request.
pub async fn send_request_cancel(
    State(state): State<AppState>,
    CallerIdentity(sender): CallerIdentity,
    Json(body): Json<TargetBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .relay
        .send_directed(
            &sender,
            body.to_user_name.as_deref().unwrap_or(""),
            ChatEvent::RequestCancel,
            None,
        )
        .await
        .map_err(relay_error)?;
    Ok(sent())
}

/// `POST /api/chat/delete` — notify the other side of a conversation delete.
pub async fn send_delete(
    State(state): State<AppState>,
    CallerIdentity(sender): CallerIdentity,
    Json(body): Json<TargetBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .relay
        .send_directed(
            &sender,
            body.to_user_name.as_deref().unwrap_or(""),
            ChatEvent::Delete,
            None,
        )
        .await
        .map_err(relay_error)?;
    Ok(sent())
}
