//! Client-facing wire schema converters.
//!
//! Each client-facing endpoint family (OpenAI Chat Completions, Anthropic
//! Messages, Gemini generate/streamGenerate) gets its own module pairing a
//! `parse_request` (client JSON → [`CanonicalRequest`]) with a non-streaming
//! response renderer and an [`SseTranslator`] impl that turns the canonical
//! [`StreamEvent`] sequence into that schema's wire SSE shape. This mirrors
//! the per-vendor `message_converter.rs` pattern the adapters use for the
//! upstream side, just facing the client instead.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use gateway_core::events::StreamEvent;
use serde_json::Value;

/// One SSE frame to write to the client: an optional `event:` line name
/// (absent for the OpenAI family, which only ever sends bare `data:`
/// frames) plus the `data:` JSON payload.
#[derive(Clone, Debug)]
pub struct SseFrame {
    pub event: Option<&'static str>,
    pub data: Value,
}

impl SseFrame {
    fn named(event: &'static str, data: Value) -> Self {
        Self { event: Some(event), data }
    }

    fn data_only(data: Value) -> Self {
        Self { event: None, data }
    }
}

/// Sentinel returned by a translator instead of a `data:` frame when the
/// schema terminates its stream with a literal `[DONE]` marker (OpenAI).
pub const DONE_MARKER: &str = "[DONE]";

/// Per-request streaming state machine, one instance per in-flight
/// streaming response. Implementations hold whatever open-block bookkeeping
/// their wire format needs (block indices, which tool call is still
/// accumulating arguments, accumulated usage) since the canonical
/// [`StreamEvent`] sequence carries only incremental deltas.
pub trait SseTranslator {
    /// Translate one canonical event into zero or more wire frames.
    ///
    /// Returns an empty `Vec` for events this schema has no wire
    /// representation for (e.g. `retry`/`safety_block` on the OpenAI and
    /// Gemini schemas, which have no equivalent mid-stream notification).
    fn translate(&mut self, event: &StreamEvent) -> Vec<SseFrame>;

    /// Literal final frame(s) to send after the event stream is exhausted
    /// (e.g. OpenAI's `data: [DONE]`). Most schemas have nothing further to
    /// send, since `Done`/`Error` already produced their closing frames.
    fn finalize(&mut self) -> Vec<SseFrame> {
        Vec::new()
    }
}

/// Build a synthetic `{error:{...}}`-shaped message for a `GatewayError`,
/// used by every schema's error rendering (non-streaming body and streaming
/// `error` event alike).
pub(crate) fn error_message(err: &gateway_core::errors::GatewayError) -> String {
    err.to_string()
}
