//! # gateway-router
//!
//! Vendor routing and account failover: decides which vendor and wire model
//! ID serves an inbound request ([`router`]), then drives credential
//! selection and retry against that vendor's pool ([`account_selector`]).
//!
//! Also hosts the shared building blocks every vendor adapter crate
//! (`gateway-anthropic`, `gateway-vertex`, `gateway-warp`) depends on: the
//! [`VendorAdapter`] trait ([`provider`]), SSE line parsing ([`sse`]),
//! stream pipeline helpers ([`stream_pipeline`]), stream-level retry
//! ([`retry`]), tool call argument parsing ([`tool_parsing`]), and upstream
//! error envelope parsing ([`error_parsing`]).

#![deny(unsafe_code)]

pub mod account_selector;
pub mod error_parsing;
pub mod models;
pub mod provider;
pub mod retry;
pub mod router;
pub mod sse;
pub mod stream_pipeline;
pub mod tool_parsing;

pub use account_selector::{AccountSelector, AttemptOutcome};
pub use error_parsing::{ApiErrorInfo, parse_api_error};
pub use provider::{AdapterRegistry, AdapterResult, StreamEventStream, VendorAdapter};
pub use retry::{StreamFactory, StreamRetryConfig, with_provider_retry};
pub use router::{ClientSchema, EndpointMatch, ModelRoute, resolve_endpoint, resolve_model};
pub use sse::{SseParserOptions, parse_sse_data, parse_sse_lines};
pub use stream_pipeline::{sse_to_event_stream, wrap_provider_stream};
pub use tool_parsing::{ToolCallContext, parse_tool_call_arguments};
