//! # gateway-vertex
//!
//! GCP Vertex AI adapter. Implements [`VendorAdapter`](gateway_router::provider::VendorAdapter)
//! against both publisher families Vertex exposes on the canonical model
//! names this gateway routes:
//! - Claude-on-Vertex (`publishers/anthropic`), reusing `gateway-anthropic`'s
//!   request/response shapes since the wire formats are near-identical.
//! - Gemini (`publishers/google`), converting to/from the `generateContent`
//!   wire format.

#![deny(unsafe_code)]

pub mod message_converter;
pub mod provider;
pub mod stream_handler;
pub mod types;

pub use provider::VertexAdapter;
pub use types::VertexConfig;
