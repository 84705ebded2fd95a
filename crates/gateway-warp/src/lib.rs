//! # gateway-warp
//!
//! Warp adapter: implements [`VendorAdapter`](gateway_router::provider::VendorAdapter)
//! against Warp's proprietary `multi_agent` Protobuf-over-SSE endpoint.
//!
//! - [`types`] — Protobuf message types generated from `proto/warp.proto` at
//!   build time, plus [`types::WarpConfig`] and the per-conversation
//!   [`types::WarpSession`]
//! - [`message_converter`] — canonical request → Warp `Request`, and the
//!   tool-call mapping table in both directions
//! - [`stream_handler`] — the `ResponseEvent` state machine → canonical
//!   [`StreamEvent`](gateway_core::events::StreamEvent)s
//! - [`provider`] — [`WarpAdapter`] implementing `VendorAdapter`
//!
//! # Authentication
//!
//! Firebase-issued ID tokens, refreshed via a Firebase API key
//! (`client_id`) and refresh token — see `gateway_auth::refresher`.

#![deny(unsafe_code)]

pub mod message_converter;
pub mod provider;
pub mod stream_handler;
pub mod types;

pub use provider::WarpAdapter;
pub use types::WarpConfig;
