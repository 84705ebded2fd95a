//! Operator API: `/api/{vendor}/credentials` CRUD plus `/batch-import`,
//! `/{id}/refresh`, `/{id}/test`, `/{id}/usage`.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gateway_core::credential::{Credential, Vendor};
use gateway_core::ids::CredentialId;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/{vendor}/credentials", get(list_credentials).post(create_credential))
        .route("/api/{vendor}/credentials/batch-import", post(batch_import))
        .route(
            "/api/{vendor}/credentials/{id}",
            get(get_credential).put(update_credential).delete(delete_credential),
        )
        .route("/api/{vendor}/credentials/{id}/refresh", post(refresh_credential))
        .route("/api/{vendor}/credentials/{id}/test", post(test_credential))
        .route("/api/{vendor}/credentials/{id}/usage", get(usage_credential))
}

fn parse_vendor(raw: &str) -> Result<Vendor, Response> {
    Vendor::from_str(raw).map_err(|e| (StatusCode::BAD_REQUEST, e).into_response())
}

fn store_error(err: gateway_store::StoreError) -> Response {
    let status = match &err {
        gateway_store::StoreError::CredentialNotFound(_) | gateway_store::StoreError::ApiKeyNotFound => StatusCode::NOT_FOUND,
        gateway_store::StoreError::DuplicateCredential(_) | gateway_store::StoreError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, json_error(err.to_string())).into_response()
}

fn json_error(message: impl Into<String>) -> Json<Value> {
    Json(json!({"error": message.into()}))
}

/// Operator-facing create/update payload. Bookkeeping fields
/// (`id`/`useCount`/`errorCount`/timestamps) are server-managed and not
/// accepted here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialInput {
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_at: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    api_base_url: Option<String>,
    #[serde(default = "default_true")]
    is_active: bool,
    #[serde(default = "default_weight")]
    weight: u32,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> u32 {
    1
}

impl CredentialInput {
    fn into_credential(self, vendor: Vendor) -> Credential {
        Credential {
            id: CredentialId::new(),
            vendor,
            name: self.name,
            email: self.email,
            refresh_token: self.refresh_token,
            access_token: self.access_token,
            expires_at: self.expires_at,
            project_id: self.project_id,
            region: self.region,
            profile_arn: None,
            client_id: self.client_id,
            client_secret: self.client_secret,
            api_base_url: self.api_base_url,
            is_active: self.is_active,
            weight: self.weight,
            use_count: 0,
            error_count: 0,
            last_error: None,
            last_used_at: None,
            quota_limit: None,
            quota_used: None,
            rate_limits: None,
            quota_exhausted_until: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }
}

#[derive(Serialize)]
struct BatchImportStatus {
    name: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn list_credentials(State(state): State<AppState>, Path(vendor): Path<String>) -> Response {
    let vendor = match parse_vendor(&vendor) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.store.get_all(vendor).await {
        Ok(creds) => Json(creds).into_response(),
        Err(err) => store_error(err),
    }
}

async fn create_credential(State(state): State<AppState>, Path(vendor): Path<String>, Json(input): Json<CredentialInput>) -> Response {
    let vendor = match parse_vendor(&vendor) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let credential = input.into_credential(vendor);
    if let Err(err) = verify_credential(&state, &credential).await {
        return (StatusCode::UNPROCESSABLE_ENTITY, json_error(format!("verification failed: {err}"))).into_response();
    }
    match state.store.add(credential).await {
        Ok(id) => (StatusCode::CREATED, Json(json!({"id": id.as_str()}))).into_response(),
        Err(err) => store_error(err),
    }
}

async fn batch_import(State(state): State<AppState>, Path(vendor): Path<String>, Json(inputs): Json<Vec<CredentialInput>>) -> Response {
    let vendor = match parse_vendor(&vendor) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut statuses = Vec::with_capacity(inputs.len());
    for input in inputs {
        let name = input.name.clone();
        let credential = input.into_credential(vendor);
        if let Err(err) = verify_credential(&state, &credential).await {
            statuses.push(BatchImportStatus { name, success: false, id: None, error: Some(err.to_string()) });
            continue;
        }
        match state.store.add(credential).await {
            Ok(id) => statuses.push(BatchImportStatus { name, success: true, id: Some(id.as_str().to_string()), error: None }),
            Err(err) => statuses.push(BatchImportStatus { name, success: false, id: None, error: Some(err.to_string()) }),
        }
    }
    Json(statuses).into_response()
}

async fn get_credential(State(state): State<AppState>, Path((vendor, id)): Path<(String, String)>) -> Response {
    if parse_vendor(&vendor).is_err() {
        return (StatusCode::BAD_REQUEST, "unknown vendor").into_response();
    }
    match state.store.get_by_id(CredentialId::from_string(id)).await {
        Ok(cred) => Json(cred).into_response(),
        Err(err) => store_error(err),
    }
}

async fn update_credential(
    State(state): State<AppState>,
    Path((vendor, id)): Path<(String, String)>,
    Json(input): Json<CredentialInput>,
) -> Response {
    let vendor = match parse_vendor(&vendor) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let existing = match state.store.get_by_id(CredentialId::from_string(id)).await {
        Ok(cred) => cred,
        Err(err) => return store_error(err),
    };
    let mut updated = input.into_credential(vendor);
    updated.id = existing.id;
    updated.use_count = existing.use_count;
    updated.error_count = existing.error_count;
    updated.last_error = existing.last_error;
    updated.last_used_at = existing.last_used_at;
    updated.quota_limit = existing.quota_limit;
    updated.quota_used = existing.quota_used;
    updated.rate_limits = existing.rate_limits;
    updated.quota_exhausted_until = existing.quota_exhausted_until;
    updated.created_at = existing.created_at;

    match state.store.update(updated).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => store_error(err),
    }
}

async fn delete_credential(State(state): State<AppState>, Path((vendor, id)): Path<(String, String)>) -> Response {
    if parse_vendor(&vendor).is_err() {
        return (StatusCode::BAD_REQUEST, "unknown vendor").into_response();
    }
    match state.store.delete(CredentialId::from_string(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => store_error(err),
    }
}

async fn refresh_credential(State(state): State<AppState>, Path((vendor, id)): Path<(String, String)>) -> Response {
    if parse_vendor(&vendor).is_err() {
        return (StatusCode::BAD_REQUEST, "unknown vendor").into_response();
    }
    let credential = match state.store.get_by_id(CredentialId::from_string(id)).await {
        Ok(cred) => cred,
        Err(err) => return store_error(err),
    };
    match state.refresher.get_valid_access_token(&credential, true).await {
        Ok(_token) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            warn!(error = %err, credential_id = %credential.id, "operator-triggered refresh failed");
            (StatusCode::BAD_GATEWAY, json_error(err.to_string())).into_response()
        }
    }
}

async fn test_credential(State(state): State<AppState>, Path((vendor, id)): Path<(String, String)>) -> Response {
    if parse_vendor(&vendor).is_err() {
        return (StatusCode::BAD_REQUEST, "unknown vendor").into_response();
    }
    let credential = match state.store.get_by_id(CredentialId::from_string(id)).await {
        Ok(cred) => cred,
        Err(err) => return store_error(err),
    };
    match verify_credential(&state, &credential).await {
        Ok(()) => Json(json!({"ok": true})).into_response(),
        Err(err) => Json(json!({"ok": false, "error": err.to_string()})).into_response(),
    }
}

async fn usage_credential(State(state): State<AppState>, Path((vendor, id)): Path<(String, String)>) -> Response {
    if parse_vendor(&vendor).is_err() {
        return (StatusCode::BAD_REQUEST, "unknown vendor").into_response();
    }
    match state.store.get_by_id(CredentialId::from_string(id)).await {
        Ok(cred) => Json(json!({
            "quotaLimit": cred.quota_limit,
            "quotaUsed": cred.quota_used,
            "rateLimits": cred.rate_limits,
            "quotaExhaustedUntil": cred.quota_exhausted_until,
            "useCount": cred.use_count,
            "errorCount": cred.error_count,
        }))
        .into_response(),
        Err(err) => store_error(err),
    }
}

/// Verification call run before a credential is accepted, on both single add
/// and batch import. A full per-vendor probe request (e.g. Anthropic's
/// minimal Haiku `max_tokens=10` call) would need a live adapter instance
/// per vendor; forcing a token exchange catches the dominant failure mode
/// (a bad refresh token or service-account key) without that extra wiring.
async fn verify_credential(state: &AppState, credential: &Credential) -> Result<(), gateway_auth::AuthError> {
    state.refresher.get_valid_access_token(credential, true).await.map(|_| ())
}
