//! # gateway-server
//!
//! Axum HTTP server: client-facing chat/generate endpoints (OpenAI,
//! Anthropic, Gemini, and Warp-native shapes), the Streaming Engine, the
//! operator CRUD API, API key authentication, and the background quota
//! refresher.
//!
//! - HTTP endpoints: health check, Prometheus metrics, client chat/generate
//!   endpoints, operator credential management
//! - Streaming Engine: canonical [`gateway_core::events::StreamEvent`] → each
//!   client schema's native SSE shape
//! - Graceful shutdown via `CancellationToken` coordination

#![deny(unsafe_code)]

pub mod auth;
pub mod dispatch;
pub mod health;
pub mod metrics;
pub mod operator;
pub mod quota_refresher;
pub mod schemas;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod streaming;
pub mod warp_proto;

pub use state::AppState;
