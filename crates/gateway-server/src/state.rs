//! Shared Axum handler state: the wired-up store, selector, adapter
//! registry, and ambient services every route handler needs.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use gateway_auth::TokenRefresher;
use gateway_config::types::GatewaySettings;
use gateway_router::account_selector::AccountSelector;
use gateway_router::provider::AdapterRegistry;
use gateway_store::CredentialStore;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::shutdown::ShutdownCoordinator;

#[derive(Clone)]
pub struct AppState {
    /// Credential pool, API key table, and request log.
    pub store: CredentialStore,
    /// Token refresh/exchange service shared by the selector, the operator
    /// API's verification calls, and the background quota refresher.
    pub refresher: Arc<TokenRefresher>,
    /// Per-vendor failover/retry driver.
    pub selector: Arc<AccountSelector>,
    /// Per-vendor upstream adapters, looked up by [`gateway_core::messages::ProviderType`].
    pub adapters: Arc<dyn AdapterRegistry>,
    /// Running context-window baseline per session id, for usage normalization.
    pub session_baselines: Arc<DashMap<String, u64>>,
    /// Base URL of the external tool runner `/w/v1/tools/execute` forwards to.
    pub tool_runner_base_url: Option<String>,
    /// Shared HTTP client for outbound calls the server makes directly
    /// (the tool runner forward; adapters hold their own clients).
    pub http: reqwest::Client,
    /// When the server started, for `/health` uptime.
    pub start_time: Instant,
    /// Graceful shutdown coordination.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Resolved settings (server/store/selector/refresher/quota_refresher).
    pub settings: Arc<GatewaySettings>,
    /// Prometheus metrics handle for rendering `/metrics`.
    pub metrics_handle: Arc<PrometheusHandle>,
}

/// A simple static map from [`ProviderType`](gateway_core::messages::ProviderType)
/// to its adapter, built once at startup.
pub struct StaticAdapterRegistry {
    anthropic: Arc<dyn gateway_router::provider::VendorAdapter>,
    vertex: Arc<dyn gateway_router::provider::VendorAdapter>,
    warp: Arc<dyn gateway_router::provider::VendorAdapter>,
}

impl StaticAdapterRegistry {
    pub fn new(
        anthropic: Arc<dyn gateway_router::provider::VendorAdapter>,
        vertex: Arc<dyn gateway_router::provider::VendorAdapter>,
        warp: Arc<dyn gateway_router::provider::VendorAdapter>,
    ) -> Self {
        Self { anthropic, vertex, warp }
    }
}

impl AdapterRegistry for StaticAdapterRegistry {
    fn get(&self, provider_type: gateway_core::messages::ProviderType) -> Option<Arc<dyn gateway_router::provider::VendorAdapter>> {
        use gateway_core::messages::ProviderType;
        Some(match provider_type {
            ProviderType::Anthropic => Arc::clone(&self.anthropic),
            ProviderType::Vertex => Arc::clone(&self.vertex),
            ProviderType::Warp => Arc::clone(&self.warp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::events::StreamEvent;
    use gateway_core::messages::ProviderType;
    use gateway_router::provider::{AdapterResult, StreamEventStream, VendorAdapter};

    struct StubAdapter(ProviderType);

    #[async_trait::async_trait]
    impl VendorAdapter for StubAdapter {
        fn provider_type(&self) -> ProviderType {
            self.0
        }

        async fn stream(&self, _request: &gateway_core::messages::CanonicalRequest, _credential: &gateway_core::credential::Credential) -> AdapterResult<StreamEventStream> {
            let events: Vec<Result<StreamEvent, gateway_core::errors::GatewayError>> = vec![];
            Ok(Box::pin(futures::stream::iter(events)))
        }
    }

    #[test]
    fn registry_routes_by_provider_type() {
        let registry = StaticAdapterRegistry::new(Arc::new(StubAdapter(ProviderType::Anthropic)), Arc::new(StubAdapter(ProviderType::Vertex)), Arc::new(StubAdapter(ProviderType::Warp)));
        assert_eq!(registry.get(ProviderType::Anthropic).unwrap().provider_type(), ProviderType::Anthropic);
        assert_eq!(registry.get(ProviderType::Vertex).unwrap().provider_type(), ProviderType::Vertex);
        assert_eq!(registry.get(ProviderType::Warp).unwrap().provider_type(), ProviderType::Warp);
    }
}
