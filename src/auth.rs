//! Service-key authentication and caller identity.
//!
//! Courier sits behind the platform's API gateway, which terminates user
//! tokens and tenant checks. Two things arrive here:
//!
//! - a pre-shared service key (`Authorization: Bearer <key>`, or `?token=`
//!   on the WebSocket upgrade where clients can't set headers), proving the
//!   request came through the gateway
//! - the already-resolved caller identity in `x-tenant-id` / `x-user-id` /
//!   `x-user-name` headers
//!
//! Token validation itself never happens in this service.

use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::identity::{normalize_name, Identity};

/// Axum middleware that rejects requests without a valid
/// `Authorization: Bearer` service key. The expected key is injected via
/// the [`ServiceKey`] extension.
///
/// # Error responses
///
/// - `401 Unauthorized` — header missing or malformed
/// - `403 Forbidden` — key present but invalid
/// - `500 Internal Server Error` — [`ServiceKey`] extension not found
pub async fn require_service_key(request: Request, next: Next) -> Response {
    let expected = match request.extensions().get::<ServiceKey>() {
        Some(key) => key.0.clone(),
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Server configuration error"})),
            )
                .into_response();
        }
    };

    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok());

    let provided = match auth_header {
        Some(h) if h.starts_with("Bearer ") => &h[7..],
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Missing or invalid Authorization header"})),
            )
                .into_response();
        }
    };

    if !constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": "Invalid service key"})),
        )
            .into_response();
    }

    next.run(request).await
}

/// Constant-time byte comparison to prevent timing side-channel attacks.
///
/// Always iterates over the full length of `expected` regardless of
/// `provided` length, so an attacker cannot determine the key length from
/// response times.
pub fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    let mut diff = u8::from(expected.len() != provided.len());
    for i in 0..expected.len() {
        let p = if i < provided.len() {
            provided[i]
        } else {
            0xff
        };
        diff |= expected[i] ^ p;
    }
    diff == 0
}

/// Extension type carrying the expected service key, injected into the
/// router layer so [`require_service_key`] can access it without touching
/// `AppState`.
#[derive(Clone)]
pub struct ServiceKey(pub String);

/// The calling user, as resolved by the upstream gateway.
///
/// Extracted from the identity headers; requests without a complete set
/// are rejected with 401 before the handler runs. The name arrives
/// normalized here whatever the gateway sent.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub Identity);

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
        };

        let tenant = header("x-tenant-id");
        let id = header("x-user-id").and_then(|v| v.parse::<i64>().ok());
        let name = header("x-user-name");

        match (tenant, id, name) {
            (Some(tenant), Some(id), Some(name)) => Ok(Self(Identity {
                tenant: tenant.to_string(),
                id,
                name: normalize_name(name),
            })),
            _ => Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Missing caller identity headers"})),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq_matches() {
        assert!(constant_time_eq(b"secret", b"secret"));
    }

    #[test]
    fn test_constant_time_eq_rejects() {
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secre"));
        assert!(!constant_time_eq(b"secret", b"secrets"));
        assert!(!constant_time_eq(b"secret", b""));
    }
}
