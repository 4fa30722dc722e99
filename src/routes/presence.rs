//! Presence and connection queries.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::CallerIdentity;
use crate::identity::normalize_name;
use crate::util::epoch_ms;
use crate::AppState;

fn internal_error(detail: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": detail})),
    )
}

/// Query parameters for the presence endpoint.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceQuery {
    #[serde(default)]
    pub user_name: String,
}

/// `GET /api/presence?userName=<name>` — online status of a named user.
///
/// `lastHeartbeat` is epoch millis, or null when the user was never seen.
pub async fn presence_query(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    Query(query): Query<PresenceQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let name = normalize_name(&query.user_name);
    if name.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "userName is required"})),
        ));
    }

    let target = state
        .resolver
        .resolve(&caller.tenant, &name)
        .await
        .map_err(|e| internal_error(&format!("identity lookup failure: {e}")))?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "target user not found"})),
        ))?;

    let liveness = state
        .liveness
        .is_live(target.id, epoch_ms())
        .await
        .map_err(|e| internal_error(&format!("store failure: {e}")))?;

    Ok(Json(json!({
        "online": liveness.live,
        "lastHeartbeat": liveness.last_seen_ms,
    })))
}

/// `GET /api/connection` — the caller's own connection binding.
///
/// `socketId` is null when no connection is currently bound.
pub async fn connection_query(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let handle = state
        .directory
        .lookup(caller.id)
        .await
        .map_err(|e| internal_error(&format!("store failure: {e}")))?;

    Ok(Json(json!({
        "userId": caller.id,
        "socketId": handle,
    })))
}
