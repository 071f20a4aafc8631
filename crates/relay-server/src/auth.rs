//! Shared-token authentication.
//!
//! A request is accepted when the configured token arrives in any of three
//! places: an `Authorization: Bearer` header, a `token` query parameter, or a
//! `token` field in a JSON body.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use relay_core::RelayError;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
struct TokenField {
    #[serde(default)]
    token: Option<String>,
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Token from a JSON body with a top-level `token` field.
pub fn body_token(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<TokenField>(body)
        .ok()
        .and_then(|field| field.token)
}

fn query_token<B>(request: &Request<B>) -> Option<String> {
    Query::<TokenField>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(field)| field.token)
}

/// Middleware rejecting requests that do not carry the configured token.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let expected = state.config.auth_token.as_str();

    if bearer_token(request.headers()) == Some(expected)
        || query_token(&request).as_deref() == Some(expected)
    {
        return next.run(request).await;
    }

    // Fall back to the body. It has to be buffered, so hand the handler a
    // rebuilt request carrying the same bytes.
    let (parts, body) = request.into_parts();
    match axum::body::to_bytes(body, state.config.max_body_bytes).await {
        Ok(bytes) if body_token(&bytes).as_deref() == Some(expected) => {
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        }
        Ok(_) => unauthorized(&state, parts.uri.path()),
        // An unreadable body cannot carry a valid token.
        Err(e) => {
            debug!(error = %e, path = %parts.uri.path(), "unauthenticated body not readable");
            unauthorized(&state, parts.uri.path())
        }
    }
}

fn unauthorized(state: &AppState, path: &str) -> Response {
    state.metrics.inc_auth_failures();
    warn!(path, "unauthorized relay request: invalid or missing token");
    ApiError(RelayError::Unauthorized).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_body_token_extraction() {
        assert_eq!(
            body_token(br#"{"agent_id":"a","token":"t"}"#).as_deref(),
            Some("t")
        );
        assert_eq!(body_token(br#"{"agent_id":"a"}"#), None);
        assert_eq!(body_token(b"not json"), None);
        assert_eq!(body_token(b""), None);
    }

    #[test]
    fn test_query_token_extraction() {
        let req = Request::get("/getUpdates?agent_id=a&token=q")
            .body(())
            .unwrap();
        assert_eq!(query_token(&req).as_deref(), Some("q"));
        let req = Request::get("/getUpdates?agent_id=a").body(()).unwrap();
        assert_eq!(query_token(&req), None);
    }
}
