//! # gateway-core
//!
//! Foundation types, errors, branded IDs, and utilities for the gateway.
//!
//! This crate provides the shared vocabulary every other gateway crate
//! depends on:
//!
//! - **Branded IDs**: `CredentialId`, `SessionId`, `RequestId` as newtypes for type safety
//! - **Messages**: `Message` enum with `User`, `Assistant`, `ToolResult` variants
//! - **Content blocks**: `ContentBlock` enum covering text, images, thinking, tool use/results
//! - **Credentials**: `Credential`, `Vendor`, `RateLimits` — the canonical credential model
//! - **Sessions**: `Session` — Warp multi-turn conversation tracking
//! - **Request state**: `RequestContext`, `SseState` — per-request and per-stream bookkeeping
//! - **Errors**: `GatewayError` hierarchy via `thiserror`
//! - **Stream events**: `StreamEvent` enum for the canonical streaming protocol

#![deny(unsafe_code)]

pub mod constants;
pub mod content;
pub mod credential;
pub mod errors;
pub mod events;
pub mod ids;
pub mod messages;
pub mod request;
pub mod retry;
pub mod session;
pub mod tools;

pub use credential::{Credential, RateLimits, Vendor};
pub use errors::{ErrorCollector, GatewayError};
pub use events::StreamEvent;
pub use ids::{CredentialId, RequestId, SessionId, ToolCallId};
pub use messages::{CanonicalRequest, Message};
pub use request::{RequestContext, SseState};
pub use session::Session;
pub use tools::Tool;
