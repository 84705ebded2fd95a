//! End-to-end integration tests: boot a real `GatewayServer` on an
//! auto-assigned port with a stub adapter registry and drive it with a real
//! HTTP client.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use gateway_auth::TokenRefresher;
use gateway_config::types::GatewaySettings;
use gateway_core::content::AssistantContent;
use gateway_core::credential::Credential;
use gateway_core::errors::GatewayError;
use gateway_core::events::{AssistantMessage, StreamEvent};
use gateway_core::messages::{CanonicalRequest, ProviderType};
use gateway_router::account_selector::AccountSelector;
use gateway_router::provider::{AdapterResult, StreamEventStream, VendorAdapter};
use gateway_server::server::GatewayServer;
use gateway_server::shutdown::ShutdownCoordinator;
use gateway_server::state::{AppState, StaticAdapterRegistry};
use gateway_store::CredentialStore;
use serde_json::{json, Value};

/// Adapter stub that replays a fixed canonical event sequence, ignoring the
/// request it's given.
struct ScriptedAdapter {
    provider_type: ProviderType,
    events: Vec<StreamEvent>,
}

#[async_trait]
impl VendorAdapter for ScriptedAdapter {
    fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    async fn stream(&self, _request: &CanonicalRequest, _credential: &Credential) -> AdapterResult<StreamEventStream> {
        let events: Vec<Result<StreamEvent, GatewayError>> = self.events.clone().into_iter().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

fn done_sequence(text: &str) -> Vec<StreamEvent> {
    vec![
        StreamEvent::Start,
        StreamEvent::TextStart,
        StreamEvent::TextDelta { delta: text.to_string() },
        StreamEvent::TextEnd { text: text.to_string(), signature: None },
        StreamEvent::Done {
            message: AssistantMessage {
                content: vec![AssistantContent::Text { text: text.to_string() }],
                token_usage: None,
            },
            stop_reason: "end_turn".to_string(),
        },
    ]
}

async fn boot_server(anthropic_events: Vec<StreamEvent>) -> (String, String, Arc<ShutdownCoordinator>, tokio::task::JoinHandle<()>) {
    let pool = gateway_store::new_in_memory(&gateway_store::ConnectionConfig::default()).unwrap();
    {
        let conn = pool.get().unwrap();
        gateway_store::run_migrations(&conn).unwrap();
    }
    let store = CredentialStore::new(pool);
    let api_key = "sk-test-gateway-key".to_string();
    store.add_api_key(api_key.clone(), "integration-test".to_string()).await.unwrap();

    let refresher = Arc::new(TokenRefresher::new(store.clone()));
    let selector = Arc::new(AccountSelector::new(store.clone(), refresher.clone()));
    let adapters = Arc::new(StaticAdapterRegistry::new(
        Arc::new(ScriptedAdapter { provider_type: ProviderType::Anthropic, events: anthropic_events }),
        Arc::new(ScriptedAdapter { provider_type: ProviderType::Vertex, events: vec![] }),
        Arc::new(ScriptedAdapter { provider_type: ProviderType::Warp, events: vec![] }),
    ));

    let mut settings = GatewaySettings::default();
    settings.server.port = 0;
    let shutdown = Arc::new(ShutdownCoordinator::new());

    let state = AppState {
        store,
        refresher,
        selector,
        adapters,
        session_baselines: Arc::new(DashMap::new()),
        tool_runner_base_url: None,
        http: reqwest::Client::new(),
        start_time: Instant::now(),
        shutdown: shutdown.clone(),
        settings: Arc::new(settings),
        metrics_handle: Arc::new(metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder().handle()),
    };

    let server = GatewayServer::new(state);
    let (addr, handle) = server.listen().await.unwrap();
    (format!("http://{addr}"), api_key, shutdown, handle)
}

#[tokio::test]
async fn health_reports_ok_while_running() {
    let (base, _key, shutdown, handle) = boot_server(vec![]).await;

    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    shutdown.shutdown();
    let _ = handle.await;
}

#[tokio::test]
async fn chat_completions_without_api_key_is_rejected() {
    let (base, _key, shutdown, handle) = boot_server(vec![]).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/v1/chat/completions"))
        .json(&json!({"model": "claude-sonnet-4.5", "messages": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    shutdown.shutdown();
    let _ = handle.await;
}

#[tokio::test]
async fn chat_completions_with_api_key_returns_assistant_reply() {
    let (base, key, shutdown, handle) = boot_server(done_sequence("hello from the adapter")).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/v1/chat/completions"))
        .bearer_auth(&key)
        .json(&json!({"model": "claude-sonnet-4.5", "messages": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    let text = body["choices"][0]["message"]["content"].as_str().unwrap();
    assert!(text.contains("hello from the adapter"));

    shutdown.shutdown();
    let _ = handle.await;
}

#[tokio::test]
async fn anthropic_messages_with_api_key_returns_assistant_reply() {
    let (base, key, shutdown, handle) = boot_server(done_sequence("claude says hi")).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/v1/messages"))
        .bearer_auth(&key)
        .json(&json!({"model": "claude-sonnet-4.5", "max_tokens": 100, "messages": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["content"][0]["text"], "claude says hi");

    shutdown.shutdown();
    let _ = handle.await;
}

#[tokio::test]
async fn operator_api_requires_auth_but_then_round_trips_a_credential() {
    let (base, key, shutdown, handle) = boot_server(vec![]).await;
    let client = reqwest::Client::new();

    let unauthed = client.get(format!("{base}/api/anthropic/credentials")).send().await.unwrap();
    assert_eq!(unauthed.status(), reqwest::StatusCode::UNAUTHORIZED);

    let listed = client
        .get(format!("{base}/api/anthropic/credentials"))
        .bearer_auth(&key)
        .send()
        .await
        .unwrap();
    assert_eq!(listed.status(), reqwest::StatusCode::OK);
    let creds: Value = listed.json().await.unwrap();
    assert!(creds.as_array().unwrap().is_empty());

    shutdown.shutdown();
    let _ = handle.await;
}

#[tokio::test]
async fn tool_execute_without_tool_runner_configured_is_unavailable() {
    let (base, key, shutdown, handle) = boot_server(vec![]).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/w/v1/tools/execute"))
        .bearer_auth(&key)
        .json(&json!({"tool_use_id": "t1", "command": "echo hi", "working_dir": "/tmp"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    shutdown.shutdown();
    let _ = handle.await;
}

#[tokio::test]
async fn unknown_api_key_is_rejected() {
    let (base, _key, shutdown, handle) = boot_server(vec![]).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/v1/chat/completions"))
        .bearer_auth("sk-not-a-real-key")
        .json(&json!({"model": "claude-sonnet-4.5", "messages": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    shutdown.shutdown();
    let _ = handle.await;
}
