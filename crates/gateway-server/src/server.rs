//! `GatewayServer` — Axum HTTP + SSE server mounting the client-facing
//! chat/generate endpoints, the Warp Protobuf pipeline, the tool-execute
//! forward, the operator CRUD API, and `/health`/`/metrics`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::{OriginalUri, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::{info, instrument};

use gateway_config::types::GatewaySettings;
use gateway_core::credential::Vendor;
use gateway_router::router::{ClientSchema, ModelRoute};

use crate::health;
use crate::state::AppState;
use crate::{auth, dispatch, operator, warp_proto};

/// Generates UUIDv7 request IDs.
#[derive(Clone)]
struct UuidV7RequestId;

impl MakeRequestId for UuidV7RequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::now_v7().to_string();
        axum::http::HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// The gateway's HTTP server: wraps the state and settings needed to build
/// and bind the Axum router.
pub struct GatewayServer {
    state: AppState,
    settings: Arc<GatewaySettings>,
}

impl GatewayServer {
    /// Build a server from fully-wired application state.
    pub fn new(state: AppState) -> Self {
        let settings = Arc::clone(&state.settings);
        Self { state, settings }
    }

    /// Build the Axum router with all routes and middleware.
    pub fn router(&self) -> Router {
        let protected = Router::new()
            .route("/v1/chat/completions", post(chat_handler))
            .route("/v1/messages", post(chat_handler))
            .route("/v1beta/models/{model_action}", post(gemini_handler))
            .route("/w/v1/chat/completions", post(chat_handler))
            .route("/w/v1/messages", post(chat_handler))
            .route("/w/v1/messages/proto", post(warp_proto_handler))
            .route("/w/v1/tools/execute", post(tools_execute_handler))
            .merge(operator::router())
            .route_layer(axum::middleware::from_fn_with_state(self.state.clone(), auth::require_api_key));

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .merge(protected)
            .with_state(self.state.clone())
            // Outermost layers execute first on request, last on response.
            .layer(CatchPanicLayer::new())
            .layer(CompressionLayer::new())
            .layer(RequestBodyLimitLayer::new(self.settings.server.max_body_bytes))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_millis(self.settings.server.request_timeout_ms),
            ))
            .layer(SetRequestIdLayer::x_request_id(UuidV7RequestId))
            .layer(PropagateRequestIdLayer::x_request_id())
    }

    /// Bind to a TCP port and start serving. Returns the bound address and a
    /// join handle for the server task.
    #[instrument(skip_all, fields(host = %self.settings.server.host, port = self.settings.server.port))]
    pub async fn listen(&self) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), std::io::Error> {
        let addr = format!("{}:{}", self.settings.server.host, self.settings.server.port);
        let listener = TcpListener::bind(&addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "gateway server started");

        let router = self.router();
        let shutdown_token = self.state.shutdown.token();

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_token.cancelled().await;
                    info!("server shutdown initiated");
                })
                .await;
            info!("server shutdown complete");
        });

        Ok((bound_addr, handle))
    }

    /// Shared application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<health::HealthResponse> {
    Json(health::health_check(state.start_time, 0, 0))
}

/// GET /metrics — Prometheus text format.
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

/// Shared handler for every JSON-bodied chat/generate endpoint whose schema
/// is fully determined by the request path (`/v1/...` and `/w/v1/...`).
async fn chat_handler(State(state): State<AppState>, OriginalUri(uri): OriginalUri, Json(body): Json<Value>) -> Response {
    match gateway_router::router::resolve_endpoint(uri.path()) {
        Some(endpoint) => dispatch::handle_request(&state, endpoint, None, &body).await,
        None => (StatusCode::NOT_FOUND, "unknown endpoint").into_response(),
    }
}

/// `/v1beta/models/{model}:generateContent` and `:streamGenerateContent` —
/// the model and the streaming flag are both encoded in the one path
/// segment after `models/`, Gemini-style.
async fn gemini_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(model_action): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let Some(endpoint) = gateway_router::router::resolve_endpoint(uri.path()) else {
        return (StatusCode::NOT_FOUND, "unknown endpoint").into_response();
    };
    let model = model_action.split(':').next().unwrap_or(&model_action);
    dispatch::handle_request(&state, endpoint, Some(model), &body).await
}

/// `/w/v1/tools/execute` — forwarded verbatim to the configured tool runner.
async fn tools_execute_handler(State(state): State<AppState>, body: Bytes) -> Response {
    dispatch::forward_tool_execute(&state, body).await
}

/// `/w/v1/messages/proto` — decode the Protobuf request, dispatch it through
/// the same selector/adapter path as the JSON schemas, and relay the result
/// back as base64-framed `ResponseEvent`s.
async fn warp_proto_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let mut request = match warp_proto::decode_request(&body) {
        Ok(request) => request,
        Err(err) => return dispatch::error_response(ClientSchema::WarpProto, &err),
    };

    let ModelRoute { vendor, wire_model_id } = gateway_router::router::resolve_model(&request.model, Some(Vendor::Warp), false);
    request.model = wire_model_id;
    request.stream = true;

    match dispatch::dispatch(&state, vendor, request).await {
        Ok(stream) => warp_proto::sse_response(stream).into_response(),
        Err(err) => dispatch::error_response(ClientSchema::WarpProto, &err),
    }
}
