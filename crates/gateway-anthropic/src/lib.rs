//! # gateway-anthropic
//!
//! Direct-to-Anthropic vendor adapter: converts canonical requests to the
//! Messages API wire format, authenticates with either an API key or an
//! OAuth access token, and relays the SSE response back as canonical
//! [`StreamEvent`](gateway_core::events::StreamEvent)s.
//!
//! - [`types`] — wire request/response/SSE types and the Claude model registry
//! - [`message_sanitizer`] — pre-conversion invariant enforcement (matched
//!   tool_use/tool_result pairs, no empty messages, first message is user)
//! - [`message_converter`] — canonical request → Anthropic Messages API body
//! - [`stream_handler`] — Anthropic SSE event sequence → canonical `StreamEvent`s
//! - [`provider`] — [`AnthropicAdapter`], implementing `VendorAdapter`
//!
//! # Authentication
//!
//! API-key credentials send `x-api-key`; OAuth credentials send
//! `Authorization: Bearer` and require the Claude Code system prompt prefix,
//! which Anthropic rejects OAuth requests without.

#![deny(unsafe_code)]

pub mod message_converter;
pub mod message_sanitizer;
pub mod provider;
pub mod stream_handler;
pub mod types;

pub use provider::AnthropicAdapter;
pub use types::{AnthropicAuth, AnthropicConfig, AnthropicProviderSettings};
