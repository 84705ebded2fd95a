//! API key authentication middleware. Accepts `Authorization: Bearer <key>`
//! or `X-API-Key: <key>`, looks the key up by its SHA-256 hash via
//! [`gateway_store::CredentialStore::find_api_key`], and rejects the request
//! before it reaches any handler if the key is missing, unknown, or
//! deactivated. The raw key is never logged or persisted — only the lookup's
//! hash ever touches storage, inside `find_api_key` itself.

use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::AppState;

const BEARER_PREFIX: &str = "Bearer ";

fn extract_key<B>(req: &Request<B>) -> Option<String> {
    if let Some(header) = req.headers().get(axum::http::header::AUTHORIZATION) {
        if let Ok(value) = header.to_str() {
            if let Some(key) = value.strip_prefix(BEARER_PREFIX) {
                return Some(key.to_string());
            }
        }
    }
    req.headers().get("x-api-key").and_then(|v| v.to_str().ok()).map(str::to_string)
}

pub async fn require_api_key(State(state): State<AppState>, req: Request<axum::body::Body>, next: Next) -> Response {
    let Some(key) = extract_key(&req) else {
        return (StatusCode::UNAUTHORIZED, "missing API key").into_response();
    };

    match state.store.find_api_key(key).await {
        Ok(Some(record)) if record.is_active => next.run(req).await,
        Ok(Some(_)) => (StatusCode::UNAUTHORIZED, "API key deactivated").into_response(),
        Ok(None) => (StatusCode::UNAUTHORIZED, "invalid API key").into_response(),
        Err(err) => {
            warn!(error = %err, "API key lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "auth lookup failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn extracts_bearer_token() {
        let req = Request::builder().header("authorization", "Bearer sk-test-123").body(Body::empty()).unwrap();
        assert_eq!(extract_key(&req), Some("sk-test-123".to_string()));
    }

    #[test]
    fn extracts_x_api_key_header() {
        let req = Request::builder().header("x-api-key", "sk-test-456").body(Body::empty()).unwrap();
        assert_eq!(extract_key(&req), Some("sk-test-456".to_string()));
    }

    #[test]
    fn no_header_yields_none() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_key(&req), None);
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let req = Request::builder().header("authorization", "Basic dXNlcjpwYXNz").body(Body::empty()).unwrap();
        assert_eq!(extract_key(&req), None);
    }
}
