//! # Warp Adapter
//!
//! Implements [`VendorAdapter`] against Warp's `multi_agent` Protobuf-over-SSE
//! endpoint (`https://app.warp.dev/ai/multi-agent`). Requests are encoded as
//! a [`Request`](crate::types::Request) Protobuf message; the response is a
//! `text/event-stream` of base64-encoded [`ResponseEvent`] frames.
//!
//! A conversation's tool-call bookkeeping (`tool_call_id → tool name`) has to
//! survive across turns of the same conversation even though each turn is a
//! fresh HTTP request, so it's kept in a session map keyed by
//! `metadata.conversation_id` rather than carried in the adapter call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use dashmap::DashMap;
use futures::StreamExt;
use gateway_core::credential::Credential;
use gateway_core::errors::GatewayError;
use gateway_core::messages::{CanonicalRequest, ProviderType};
use gateway_router::provider::{AdapterResult, StreamEventStream, VendorAdapter};
use gateway_router::sse::SseParserOptions;
use gateway_router::stream_pipeline::wrap_provider_stream;
use gateway_store::CredentialStore;
use prost::Message as _;
use uuid::Uuid;

use crate::message_converter::build_warp_request;
use crate::stream_handler::{process_response_event, WarpStreamState};
use crate::types::{ResponseEvent, WarpConfig, WarpSession};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Warp `multi_agent` vendor adapter.
pub struct WarpAdapter {
    http: reqwest::Client,
    store: CredentialStore,
    config: WarpConfig,
    sessions: Arc<DashMap<String, WarpSession>>,
}

impl WarpAdapter {
    /// Build an adapter over the given HTTP client and credential store.
    #[must_use]
    pub fn new(http: reqwest::Client, store: CredentialStore, config: WarpConfig) -> Self {
        Self { http, store, config, sessions: Arc::new(DashMap::new()) }
    }

    async fn send(&self, body: &[u8], access_token: &str) -> AdapterResult<reqwest::Response> {
        let response = self
            .http
            .post(&self.config.base_url)
            .timeout(DEFAULT_TIMEOUT)
            .header("content-type", "application/x-protobuf")
            .header("accept", "text/event-stream")
            .header("authorization", format!("Bearer {access_token}"))
            .header("x-warp-client-id", &self.config.client_id)
            .header("x-warp-client-version", &self.config.client_version)
            .header("x-warp-os-category", &self.config.os_category)
            .header("x-warp-os-name", &self.config.os_name)
            .header("x-warp-os-version", &self.config.os_version)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|err| GatewayError::UpstreamTransient { status: err.status().map(|s| s.as_u16()), message: err.to_string() })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let info = gateway_router::error_parsing::parse_api_error(&body, status);
            return Err(GatewayError::from_upstream_message(Some(status), &info.message));
        }

        Ok(response)
    }
}

#[async_trait]
impl VendorAdapter for WarpAdapter {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Warp
    }

    async fn stream(&self, request: &CanonicalRequest, credential: &Credential) -> AdapterResult<StreamEventStream> {
        let refresher = gateway_auth::TokenRefresher::new(self.store.clone());
        let access_token = refresher
            .get_valid_access_token(credential, false)
            .await
            .map_err(|err| GatewayError::TokenRefreshFailed { status: None, message: err.to_string() })?;

        let conversation_id = request.session_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        let wire_request = {
            let mut session = self.sessions.entry(conversation_id.clone()).or_default();
            build_warp_request(request, &self.config, &mut session)
        };
        let body = wire_request.encode_to_vec();

        let response = self.send(&body, &access_token).await;
        wrap_provider_stream("warp", response.map(|r| to_event_stream(r, self.sessions.clone(), conversation_id)))
    }
}

fn to_event_stream(response: reqwest::Response, sessions: Arc<DashMap<String, WarpSession>>, conversation_id: String) -> StreamEventStream {
    static OPTIONS: SseParserOptions = SseParserOptions { process_remaining_buffer: false };

    let byte_stream = response.bytes_stream();
    let sse_lines = gateway_router::sse::parse_sse_lines(byte_stream, &OPTIONS);

    let events = sse_lines.scan(WarpStreamState::default(), move |handler_state, line| {
        let events = decode_response_event(&line)
            .map(|event| {
                let mut session = sessions.entry(conversation_id.clone()).or_default();
                process_response_event(&event, handler_state, &mut session)
            })
            .unwrap_or_default();
        std::future::ready(Some(events))
    });

    Box::pin(events.flat_map(futures::stream::iter).map(Ok))
}

fn decode_response_event(data: &str) -> Option<ResponseEvent> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(data.trim()).ok()?;
    ResponseEvent::decode(bytes.as_slice()).ok()
}
