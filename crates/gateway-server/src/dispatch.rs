//! Client endpoint dispatch: request parsing → routing → credential
//! selection → adapter call → response rendering, shared by every
//! client-facing schema handler in [`crate::server`].

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use gateway_core::credential::Vendor;
use gateway_core::errors::GatewayError;
use gateway_core::events::{AssistantMessage, StreamEvent};
use gateway_core::messages::{CanonicalRequest, ProviderType};
use gateway_router::account_selector::AttemptOutcome;
use gateway_router::provider::{AdapterRegistry, StreamEventStream, VendorAdapter};
use gateway_router::router::{ClientSchema, EndpointMatch, ModelRoute};
use gateway_usage::normalization::normalize_tokens;
use gateway_usage::types::{TokenMeta, TokenSource};
use serde_json::Value;
use tracing::{debug, warn};

use crate::schemas::SseTranslator;
use crate::streaming;
use crate::AppState;

/// Maps [`Vendor`] (the credential-pool dimension) to [`ProviderType`] (the
/// adapter-registry dimension). Every variant on one side has exactly one
/// counterpart on the other — kept as two enums because `gateway-core`
/// already drew that line before this crate existed.
fn provider_type_for(vendor: Vendor) -> ProviderType {
    match vendor {
        Vendor::Anthropic => ProviderType::Anthropic,
        Vendor::Vertex => ProviderType::Vertex,
        Vendor::Warp => ProviderType::Warp,
    }
}

/// Classify an adapter-reported error into the [`AttemptOutcome`] variant
/// that tells [`gateway_router::AccountSelector`] how to react.
fn classify_error<T>(err: GatewayError) -> AttemptOutcome<T> {
    if err.should_quarantine_credential() {
        return match &err {
            GatewayError::UpstreamTransient { status: Some(429), .. } => AttemptOutcome::QuotaExceeded,
            GatewayError::UpstreamPermanent { status: 401 | 403, .. } => AttemptOutcome::AuthRejected,
            GatewayError::TokenRefreshFailed { .. } => AttemptOutcome::AuthRejected,
            _ => AttemptOutcome::Transient(err),
        };
    }
    if err.is_retryable() {
        AttemptOutcome::Transient(err)
    } else {
        AttemptOutcome::Fatal(err)
    }
}

/// Drive the account selector + adapter for one canonical request, honoring
/// `max_tokens`/model already resolved onto it.
///
/// Shared with [`crate::warp_proto`], which dispatches the decoded Protobuf
/// request through the same selector/adapter path before translating the
/// resulting stream back into Warp's wire format instead of a JSON schema.
pub(crate) async fn dispatch(state: &AppState, vendor: Vendor, request: CanonicalRequest) -> Result<StreamEventStream, GatewayError> {
    let provider_type = provider_type_for(vendor);
    let adapter = state
        .adapters
        .get(provider_type)
        .ok_or_else(|| GatewayError::NoCredentialAvailable { vendor: format!("{vendor:?}") })?;

    state
        .selector
        .with_credential(vendor, |credential, _token| {
            let adapter = Arc::clone(&adapter);
            let request = request.clone();
            async move {
                match adapter.stream(&request, &credential).await {
                    Ok(stream) => AttemptOutcome::Success(stream),
                    Err(err) => classify_error(err),
                }
            }
        })
        .await
}

/// Consume a canonical event stream to completion, returning the final
/// message and stop reason for a non-streaming client response.
async fn drain_to_message(mut stream: StreamEventStream) -> Result<(AssistantMessage, String), GatewayError> {
    while let Some(item) = stream.next().await {
        match item? {
            StreamEvent::Done { message, stop_reason } => return Ok((message, stop_reason)),
            StreamEvent::Error { error } => {
                return Err(GatewayError::UpstreamTransient { status: None, message: error });
            }
            _ => {}
        }
    }
    Err(GatewayError::ProtocolError("upstream stream ended without a done event".into()))
}

/// Track the running context-window baseline for a session and log a
/// normalized usage record. Best-effort: a session id is supplied by
/// clients that want cross-turn tracking (Anthropic's `metadata.session_id`,
/// OpenAI's `user`); requests without one are normalized with a zero
/// baseline every time.
fn record_usage(state: &AppState, session_id: Option<&str>, provider: ProviderType, message: &AssistantMessage) {
    let Some(usage) = &message.token_usage else { return };
    let session_key = session_id.unwrap_or("unscoped").to_string();
    let previous_baseline = state.session_baselines.get(&session_key).map(|v| *v).unwrap_or(0);

    let source = TokenSource {
        provider,
        timestamp: chrono::Utc::now().to_rfc3339(),
        raw_input_tokens: usage.input_tokens,
        raw_output_tokens: usage.output_tokens,
        raw_cache_read_tokens: usage.cache_read_tokens.unwrap_or(0),
        raw_cache_creation_tokens: usage.cache_creation_tokens.unwrap_or(0),
    };
    let meta = TokenMeta {
        turn: 0,
        session_id: session_key.clone(),
        extracted_at: source.timestamp.clone(),
        normalized_at: String::new(),
    };
    let record = normalize_tokens(source, previous_baseline, meta);
    state.session_baselines.insert(session_key, record.computed.context_window_tokens);
    debug!(
        context_window_tokens = record.computed.context_window_tokens,
        new_input_tokens = record.computed.new_input_tokens,
        "usage normalized"
    );
}

/// Render a [`GatewayError`] as the given schema's native error response.
pub fn error_response(schema: ClientSchema, err: &GatewayError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = match schema {
        ClientSchema::OpenAiChat => crate::schemas::openai::error_response(err),
        ClientSchema::AnthropicMessages | ClientSchema::WarpProto => crate::schemas::anthropic::error_response(err),
        ClientSchema::GeminiGenerate | ClientSchema::GeminiStream => crate::schemas::gemini::error_response(err),
    };
    (status, axum::Json(body)).into_response()
}

/// Shared entry point for every client-facing chat/generate endpoint.
///
/// `model_hint` is the path-derived model for schemas that carry it outside
/// the body (Gemini); schemas that carry `model` in the body pass `None`.
pub async fn handle_request(
    state: &AppState,
    endpoint: EndpointMatch,
    model_hint: Option<&str>,
    body: &Value,
) -> Response {
    let parsed = match endpoint.schema {
        ClientSchema::OpenAiChat => crate::schemas::openai::parse_request(body),
        ClientSchema::AnthropicMessages | ClientSchema::WarpProto => crate::schemas::anthropic::parse_request(body),
        ClientSchema::GeminiGenerate => {
            crate::schemas::gemini::parse_request(body, model_hint.unwrap_or_default(), false)
        }
        ClientSchema::GeminiStream => {
            crate::schemas::gemini::parse_request(body, model_hint.unwrap_or_default(), true)
        }
    };

    let mut request = match parsed {
        Ok(req) => req,
        Err(err) => return error_response(endpoint.schema, &err),
    };

    let client_wants_stream = request.stream;
    let is_gemini = matches!(endpoint.schema, ClientSchema::GeminiGenerate | ClientSchema::GeminiStream);
    let ModelRoute { vendor, wire_model_id } = gateway_router::router::resolve_model(&request.model, endpoint.forced_vendor, is_gemini);
    request.model = wire_model_id;
    // The adapter pipeline always parses upstream responses as SSE; the
    // client's stream flag only controls whether we relay it live or
    // buffer it into a single JSON response below.
    request.stream = true;

    let session_id = request.session_id.clone();
    let model_for_response = request.model.clone();

    let stream = match dispatch(state, vendor, request).await {
        Ok(stream) => stream,
        Err(err) => return error_response(endpoint.schema, &err),
    };

    if client_wants_stream {
        return match endpoint.schema {
            ClientSchema::OpenAiChat => {
                let translator = crate::schemas::openai::OpenAiSseTranslator::new(model_for_response, chrono::Utc::now().timestamp());
                streaming::sse_response(stream, translator).into_response()
            }
            ClientSchema::AnthropicMessages | ClientSchema::WarpProto => {
                let translator = crate::schemas::anthropic::AnthropicSseTranslator::new(model_for_response, 0);
                streaming::sse_response(stream, translator).into_response()
            }
            ClientSchema::GeminiGenerate | ClientSchema::GeminiStream => {
                let translator = crate::schemas::gemini::GeminiSseTranslator::new();
                streaming::sse_response(stream, translator).into_response()
            }
        };
    }

    match drain_to_message(stream).await {
        Ok((message, stop_reason)) => {
            record_usage(state, session_id.as_deref(), provider_type_for(vendor), &message);
            let body = match endpoint.schema {
                ClientSchema::OpenAiChat => crate::schemas::openai::non_streaming_response(&message, &stop_reason, &model_for_response),
                ClientSchema::AnthropicMessages | ClientSchema::WarpProto => {
                    crate::schemas::anthropic::non_streaming_response(&message, &stop_reason, &model_for_response)
                }
                ClientSchema::GeminiGenerate | ClientSchema::GeminiStream => {
                    crate::schemas::gemini::non_streaming_response(&message, &stop_reason)
                }
            };
            axum::Json(body).into_response()
        }
        Err(err) => error_response(endpoint.schema, &err),
    }
}

/// `/w/v1/tools/execute` — pure HTTP forward to an external, untrusted tool
/// runner. The gateway never executes tools itself.
pub async fn forward_tool_execute(state: &AppState, body: Bytes) -> Response {
    let Some(base_url) = &state.tool_runner_base_url else {
        warn!("tool execute requested but no tool runner is configured");
        return (StatusCode::SERVICE_UNAVAILABLE, "tool runner not configured").into_response();
    };

    let url = format!("{}/v1/tools/execute", base_url.trim_end_matches('/'));
    let response = state.http.post(&url).header("content-type", "application/json").body(body).send().await;

    match response {
        Ok(resp) => {
            let status = resp.status();
            let bytes = resp.bytes().await.unwrap_or_default();
            (status, bytes).into_response()
        }
        Err(err) => {
            warn!(error = %err, "tool runner forward failed");
            (StatusCode::BAD_GATEWAY, format!("tool runner unreachable: {err}")).into_response()
        }
    }
}
