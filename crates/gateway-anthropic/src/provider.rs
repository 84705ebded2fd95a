//! # Anthropic Adapter
//!
//! Implements [`VendorAdapter`] against the Anthropic Messages API directly
//! (`https://api.anthropic.com/v1/messages`), handling both API-key and
//! OAuth-authenticated credentials.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use gateway_core::credential::Credential;
use gateway_core::errors::GatewayError;
#[cfg(test)]
use gateway_core::events::StreamEvent;
use gateway_core::messages::{CanonicalRequest, ProviderType};
use gateway_router::provider::{AdapterResult, StreamEventStream, VendorAdapter};
use gateway_router::sse::SseParserOptions;
use gateway_router::stream_pipeline::wrap_provider_stream;
use gateway_store::CredentialStore;
use tracing::warn;

use crate::message_converter::build_request;
use crate::message_sanitizer::sanitize_messages;
use crate::stream_handler::{StreamHandlerState, handle_sse_event};
use crate::types::{AnthropicAuth, AnthropicConfig};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_BETA: &str = "oauth-2025-04-20,prompt-caching-2024-07-31";
const USER_AGENT: &str = "gateway/1.0 (Anthropic direct adapter)";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Direct-to-Anthropic vendor adapter.
pub struct AnthropicAdapter {
    http: reqwest::Client,
    store: CredentialStore,
    config: AnthropicConfig,
}

impl AnthropicAdapter {
    /// Build an adapter over the given HTTP client and credential store.
    #[must_use]
    pub fn new(http: reqwest::Client, store: CredentialStore, config: AnthropicConfig) -> Self {
        Self { http, store, config }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or("https://api.anthropic.com/v1/messages")
    }

    async fn send(
        &self,
        request: &CanonicalRequest,
        credential: &Credential,
        access_token: &str,
    ) -> AdapterResult<reqwest::Response> {
        let is_oauth = AnthropicAuth::for_credential(credential) == AnthropicAuth::OAuth;

        let mut sanitized = request.clone();
        sanitized.messages = sanitize_messages(request.messages.clone());
        let body = build_request(&sanitized, is_oauth, self.config.default_max_tokens);

        let mut req = self
            .http
            .post(self.base_url())
            .timeout(DEFAULT_TIMEOUT)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .header("user-agent", USER_AGENT)
            .json(&body);

        req = if is_oauth {
            req.header("authorization", format!("Bearer {access_token}"))
                .header("anthropic-beta", ANTHROPIC_BETA)
        } else {
            req.header("x-api-key", access_token)
        };

        let response = req.send().await.map_err(|err| GatewayError::UpstreamTransient {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let info = gateway_router::error_parsing::parse_api_error(&body, status);
            return Err(GatewayError::from_upstream_message(Some(status), &info.message));
        }

        self.persist_rate_limits(credential.id.clone(), response.headers()).await;

        Ok(response)
    }

    /// Parse `anthropic-ratelimit-*` and `unified-*` response headers and
    /// persist them to the credential's rate-limit snapshot.
    async fn persist_rate_limits(&self, id: gateway_core::ids::CredentialId, headers: &reqwest::header::HeaderMap) {
        let Some(rate_limits) = parse_rate_limit_headers(headers) else {
            return;
        };
        if let Err(err) = self.store.update_rate_limits(id, rate_limits).await {
            warn!(error = %err, "failed to persist anthropic rate limits");
        }
    }
}

#[async_trait]
impl VendorAdapter for AnthropicAdapter {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Anthropic
    }

    async fn stream(&self, request: &CanonicalRequest, credential: &Credential) -> AdapterResult<StreamEventStream> {
        let refresher = gateway_auth::TokenRefresher::new(self.store.clone());
        let access_token = refresher
            .get_valid_access_token(credential, false)
            .await
            .map_err(|err| GatewayError::TokenRefreshFailed { status: None, message: err.to_string() })?;

        let response = self.send(request, credential, &access_token).await;
        wrap_provider_stream("anthropic", response.map(to_event_stream))
    }
}

fn to_event_stream(response: reqwest::Response) -> StreamEventStream {
    static OPTIONS: SseParserOptions = SseParserOptions { process_remaining_buffer: false };

    let byte_stream = response.bytes_stream();
    let sse_lines = gateway_router::sse::parse_sse_lines(byte_stream, &OPTIONS);

    let events = sse_lines.scan(StreamHandlerState::default(), move |handler_state, line| {
        let Some(event): Option<crate::types::AnthropicSseEvent> =
            gateway_router::sse::parse_sse_data(&line, "anthropic")
        else {
            return std::future::ready(Some(vec![]));
        };
        let events = handle_sse_event(&event, handler_state);
        std::future::ready(Some(events))
    });

    Box::pin(events.flat_map(futures::stream::iter).map(Ok))
}

/// Parse Anthropic's `anthropic-ratelimit-*` headers into [`RateLimits`].
///
/// Returns `None` if no rate-limit headers are present at all.
fn parse_rate_limit_headers(headers: &reqwest::header::HeaderMap) -> Option<gateway_core::credential::RateLimits> {
    let header_u64 = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).and_then(|v| v.parse::<u64>().ok());
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(String::from);

    let requests_remaining = header_u64("anthropic-ratelimit-requests-remaining");
    let tokens_remaining = header_u64("anthropic-ratelimit-tokens-remaining")
        .or_else(|| header_u64("anthropic-ratelimit-input-tokens-remaining"));
    let reset_at = header_str("anthropic-ratelimit-requests-reset")
        .or_else(|| header_str("anthropic-ratelimit-tokens-reset"));

    if requests_remaining.is_none() && tokens_remaining.is_none() && reset_at.is_none() {
        return None;
    }

    Some(gateway_core::credential::RateLimits { requests_remaining, tokens_remaining, reset_at })
}
