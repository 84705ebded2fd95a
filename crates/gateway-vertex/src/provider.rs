//! # Vertex Adapter
//!
//! Implements [`VendorAdapter`] against GCP Vertex AI, routing to either the
//! Claude-on-Vertex `rawPredict`/`streamRawPredict` endpoint or plain
//! Gemini's `generateContent`/`streamGenerateContent`, depending on which
//! publisher model the canonical request resolves to.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use gateway_core::credential::Credential;
use gateway_core::errors::GatewayError;
use gateway_core::messages::{CanonicalRequest, ProviderType};
use gateway_router::provider::{AdapterResult, StreamEventStream, VendorAdapter};
use gateway_router::sse::SseParserOptions;
use gateway_router::stream_pipeline::wrap_provider_stream;
use gateway_store::CredentialStore;
use tracing::warn;

use crate::message_converter::{build_claude_vertex_request, build_gemini_request};
use crate::stream_handler::{create_stream_state, process_stream_chunk};
use crate::types::{resolve_vertex_model, CountTokensResponse, VertexConfig, VertexModelFamily, VertexModelInfo};

const USER_AGENT: &str = "gateway/1.0 (Vertex adapter)";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

pub struct VertexAdapter {
    http: reqwest::Client,
    store: CredentialStore,
    config: VertexConfig,
}

impl VertexAdapter {
    #[must_use]
    pub fn new(http: reqwest::Client, store: CredentialStore, config: VertexConfig) -> Self {
        Self { http, store, config }
    }

    /// Resolve the `{region}-aiplatform.googleapis.com` host for a
    /// credential/region pair. `global` routes to `us-central1` on the
    /// non-regional host, per spec.
    fn host(&self, region: &str) -> String {
        if let Some(base) = &self.config.base_url_override {
            return base.clone();
        }
        if region == "global" {
            "https://us-central1-aiplatform.googleapis.com".into()
        } else {
            format!("https://{region}-aiplatform.googleapis.com")
        }
    }

    fn region_for(&self, credential: &Credential) -> String {
        credential.region.clone().unwrap_or_else(|| self.config.default_region.clone())
    }

    fn endpoint_url(&self, credential: &Credential, model: &VertexModelInfo, method: &str) -> AdapterResult<String> {
        let project_id = credential
            .project_id
            .as_deref()
            .ok_or_else(|| GatewayError::ClientError("vertex credential missing project_id".into()))?;
        let region = self.region_for(credential);
        let publisher = match model.family {
            VertexModelFamily::Anthropic => "anthropic",
            VertexModelFamily::Google => "google",
        };
        Ok(format!(
            "{}/v1/projects/{project_id}/locations/{region}/publishers/{publisher}/models/{}:{method}",
            self.host(&region),
            model.vertex_id
        ))
    }

    async fn post(&self, url: &str, access_token: &str, body: &impl serde::Serialize) -> AdapterResult<reqwest::Response> {
        let response = self
            .http
            .post(url)
            .timeout(DEFAULT_TIMEOUT)
            .header("authorization", format!("Bearer {access_token}"))
            .header("content-type", "application/json")
            .header("user-agent", USER_AGENT)
            .json(body)
            .send()
            .await
            .map_err(|err| GatewayError::UpstreamTransient { status: err.status().map(|s| s.as_u16()), message: err.to_string() })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let info = gateway_router::error_parsing::parse_api_error(&text, status);
            return Err(GatewayError::from_upstream_message(Some(status), &info.message));
        }
        Ok(response)
    }
}

#[async_trait]
impl VendorAdapter for VertexAdapter {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Vertex
    }

    async fn stream(&self, request: &CanonicalRequest, credential: &Credential) -> AdapterResult<StreamEventStream> {
        let refresher = gateway_auth::TokenRefresher::new(self.store.clone());
        let access_token = refresher
            .get_valid_access_token(credential, false)
            .await
            .map_err(|err| GatewayError::TokenRefreshFailed { status: None, message: err.to_string() })?;

        let model = resolve_vertex_model(&request.model);

        match model.family {
            VertexModelFamily::Anthropic => {
                let url = self.endpoint_url(credential, model, "streamRawPredict")?;
                let body = build_claude_vertex_request(request, self.config.default_max_tokens);
                let response = self.post(&url, &access_token, &body).await;
                wrap_provider_stream("vertex-anthropic", response.map(to_claude_event_stream))
            }
            VertexModelFamily::Google => {
                let url = self.endpoint_url(credential, model, "streamGenerateContent")?;
                let body = build_gemini_request(request, self.config.default_max_tokens);
                let response = self.post(&url, &access_token, &body).await;
                wrap_provider_stream("vertex-gemini", response.map(to_gemini_event_stream))
            }
        }
    }

    async fn count_tokens(&self, request: &CanonicalRequest, credential: &Credential) -> AdapterResult<Option<u64>> {
        let refresher = gateway_auth::TokenRefresher::new(self.store.clone());
        let access_token = refresher
            .get_valid_access_token(credential, false)
            .await
            .map_err(|err| GatewayError::TokenRefreshFailed { status: None, message: err.to_string() })?;

        let model = resolve_vertex_model(&request.model);
        let url = self.endpoint_url(credential, model, "countTokens")?;

        let body = match model.family {
            VertexModelFamily::Anthropic => {
                serde_json::to_value(build_claude_vertex_request(request, self.config.default_max_tokens))
                    .map_err(|err| GatewayError::ClientError(err.to_string()))?
            }
            VertexModelFamily::Google => serde_json::to_value(build_gemini_request(request, self.config.default_max_tokens))
                .map_err(|err| GatewayError::ClientError(err.to_string()))?,
        };

        let response = self.post(&url, &access_token, &body).await?;
        let parsed: CountTokensResponse =
            response.json().await.map_err(|err| GatewayError::UpstreamTransient { status: None, message: err.to_string() })?;
        Ok(Some(parsed.total_tokens))
    }
}

fn to_claude_event_stream(response: reqwest::Response) -> StreamEventStream {
    static OPTIONS: SseParserOptions = SseParserOptions { process_remaining_buffer: false };
    let byte_stream = response.bytes_stream();
    let sse_lines = gateway_router::sse::parse_sse_lines(byte_stream, &OPTIONS);

    let events = sse_lines.scan(gateway_anthropic::stream_handler::StreamHandlerState::default(), move |state, line| {
        let Some(event): Option<gateway_anthropic::types::AnthropicSseEvent> = gateway_router::sse::parse_sse_data(&line, "vertex-anthropic") else {
            return std::future::ready(Some(vec![]));
        };
        std::future::ready(Some(gateway_anthropic::stream_handler::handle_sse_event(&event, state)))
    });

    Box::pin(events.flat_map(futures::stream::iter).map(Ok))
}

fn to_gemini_event_stream(response: reqwest::Response) -> StreamEventStream {
    static OPTIONS: SseParserOptions = SseParserOptions { process_remaining_buffer: true };
    let byte_stream = response.bytes_stream();
    let sse_lines = gateway_router::sse::parse_sse_lines(byte_stream, &OPTIONS);

    let events = sse_lines.scan(create_stream_state(), move |state, line| {
        let Some(chunk): Option<crate::types::GeminiStreamChunk> = gateway_router::sse::parse_sse_data(&line, "vertex-gemini") else {
            return std::future::ready(Some(vec![]));
        };
        std::future::ready(Some(process_stream_chunk(&chunk, state)))
    });

    Box::pin(events.flat_map(futures::stream::iter).map(Ok))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::ids::CredentialId;

    fn test_store() -> CredentialStore {
        let pool = gateway_store::sqlite::connection::new_in_memory(&gateway_store::sqlite::connection::ConnectionConfig::default()).unwrap();
        gateway_store::sqlite::migrations::run_migrations(&pool.get().unwrap()).unwrap();
        CredentialStore::new(pool)
    }

    fn vertex_credential() -> Credential {
        Credential {
            id: CredentialId::new(),
            vendor: gateway_core::credential::Vendor::Vertex,
            name: "test".into(),
            email: None,
            refresh_token: None,
            access_token: Some("token".into()),
            expires_at: None,
            project_id: Some("my-project".into()),
            region: Some("us-east4".into()),
            profile_arn: None,
            client_id: None,
            client_secret: None,
            api_base_url: None,
            is_active: true,
            weight: 1,
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

    #[test]
    fn provider_type_is_vertex() {
        let adapter = VertexAdapter::new(reqwest::Client::new(), test_store(), VertexConfig::default());
        assert_eq!(adapter.provider_type(), ProviderType::Vertex);
    }

    #[test]
    fn endpoint_url_routes_claude_model_to_anthropic_publisher() {
        let adapter = VertexAdapter::new(reqwest::Client::new(), test_store(), VertexConfig::default());
        let model = resolve_vertex_model("claude-opus-4-5");
        let url = adapter.endpoint_url(&vertex_credential(), model, "streamRawPredict").unwrap();
        assert!(url.contains("us-east4-aiplatform.googleapis.com"));
        assert!(url.contains("publishers/anthropic/models/claude-opus-4-5@20251101:streamRawPredict"));
    }

    #[test]
    fn endpoint_url_global_region_targets_us_central1_host() {
        let adapter = VertexAdapter::new(reqwest::Client::new(), test_store(), VertexConfig::default());
        let mut credential = vertex_credential();
        credential.region = Some("global".into());
        let model = resolve_vertex_model("gemini-2.5-pro");
        let url = adapter.endpoint_url(&credential, model, "streamGenerateContent").unwrap();
        assert!(url.contains("us-central1-aiplatform.googleapis.com"));
        assert!(url.contains("publishers/google/models/gemini-2.5-pro"));
    }

    #[test]
    fn endpoint_url_requires_project_id() {
        let adapter = VertexAdapter::new(reqwest::Client::new(), test_store(), VertexConfig::default());
        let mut credential = vertex_credential();
        credential.project_id = None;
        let model = resolve_vertex_model("gemini-2.5-pro");
        assert!(adapter.endpoint_url(&credential, model, "streamGenerateContent").is_err());
    }

    #[tokio::test]
    async fn stream_routes_claude_model_through_anthropic_relay() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let body = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"usage\":{\"input_tokens\":5,\"output_tokens\":0}}}\n\n",
            "event: content_block_start\n",
            "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"hi\"}}\n\n",
            "event: content_block_stop\n",
            "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );

        Mock::given(method("POST"))
            .and(path("/v1/projects/my-project/locations/us-east4/publishers/anthropic/models/claude-opus-4-5@20251101:streamRawPredict"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/event-stream").set_body_string(body))
            .mount(&server)
            .await;

        let config = VertexConfig { base_url_override: Some(server.uri()), ..Default::default() };
        let adapter = VertexAdapter::new(reqwest::Client::new(), test_store(), config);
        let request = CanonicalRequest { model: "claude-opus-4-5".into(), messages: vec![gateway_core::messages::Message::user("hi")], ..Default::default() };

        let stream = adapter.stream(&request, &vertex_credential()).await.unwrap();
        let events: Vec<_> = stream.collect().await.into_iter().map(|e| e.unwrap()).collect();
        assert!(events.iter().any(|e| matches!(e, gateway_core::events::StreamEvent::TextDelta { delta } if delta == "hi")));
    }
}
