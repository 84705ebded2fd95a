//! Gateway binary: loads settings, opens the credential store, wires the
//! three vendor adapters behind the account selector, and serves the
//! client-facing HTTP API until a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use dashmap::DashMap;
use tracing_subscriber::EnvFilter;

use gateway_anthropic::AnthropicAdapter;
use gateway_auth::TokenRefresher;
use gateway_config::types::GatewaySettings;
use gateway_router::account_selector::AccountSelector;
use gateway_server::server::GatewayServer;
use gateway_server::shutdown::ShutdownCoordinator;
use gateway_server::state::{AppState, StaticAdapterRegistry};
use gateway_server::{metrics, quota_refresher::QuotaRefresher};
use gateway_store::CredentialStore;
use gateway_vertex::VertexAdapter;
use gateway_warp::WarpAdapter;

/// AI provider aggregation gateway.
#[derive(Parser, Debug)]
#[command(name = "gateway")]
struct Cli {
    /// Override the bind host from settings.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port from settings.
    #[arg(long)]
    port: Option<u16>,

    /// Override the SQLite database path from settings.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Base URL of the external tool runner `/w/v1/tools/execute` forwards
    /// to. If unset, tool-execute requests return 503.
    #[arg(long, env = "GATEWAY_TOOL_RUNNER_URL")]
    tool_runner_url: Option<String>,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .with_target(true)
        .init();
}

fn ensure_parent_dir(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = Cli::parse();

    let mut settings = gateway_config::load_settings().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to load settings, using defaults");
        GatewaySettings::default()
    });
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(db_path) = &args.db_path {
        settings.store.sqlite_path = db_path.to_string_lossy().to_string();
    }

    let db_path = PathBuf::from(&settings.store.sqlite_path);
    ensure_parent_dir(&db_path)?;

    let pool_config = gateway_store::ConnectionConfig { pool_size: settings.store.pool_size, ..Default::default() };
    let pool = gateway_store::new_file(&settings.store.sqlite_path, &pool_config).context("failed to open credential store")?;
    {
        let conn = pool.get().context("failed to get a store connection for migrations")?;
        gateway_store::run_migrations(&conn).context("failed to run store migrations")?;
    }
    let store = CredentialStore::new(pool);

    let refresher = Arc::new(TokenRefresher::new(store.clone()));
    let selector = Arc::new(AccountSelector::new(store.clone(), refresher.clone()).with_max_retries(settings.selector.max_retries));

    let http = reqwest::Client::new();
    let adapters = Arc::new(StaticAdapterRegistry::new(
        Arc::new(AnthropicAdapter::new(http.clone(), store.clone(), Default::default())),
        Arc::new(VertexAdapter::new(http.clone(), store.clone(), Default::default())),
        Arc::new(WarpAdapter::new(http.clone(), store.clone(), Default::default())),
    ));

    let metrics_handle = Arc::new(metrics::install_recorder());
    let shutdown = Arc::new(ShutdownCoordinator::new());

    let state = AppState {
        store: store.clone(),
        refresher: refresher.clone(),
        selector,
        adapters,
        session_baselines: Arc::new(DashMap::new()),
        tool_runner_base_url: args.tool_runner_url,
        http,
        start_time: Instant::now(),
        shutdown: shutdown.clone(),
        settings: Arc::new(settings.clone()),
        metrics_handle,
    };

    let server = GatewayServer::new(state);
    let (addr, server_handle) = server.listen().await.context("failed to bind gateway server")?;
    tracing::info!(%addr, "gateway listening");

    let quota_refresher = Arc::new(QuotaRefresher::new(store, refresher, settings.quota_refresher));
    let quota_handle = quota_refresher.spawn(shutdown.token());

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown signal received");

    shutdown.graceful_shutdown(vec![server_handle, quota_handle], None).await;
    tracing::info!("shutdown complete");

    Ok(())
}
