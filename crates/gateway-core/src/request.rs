//! Per-inbound-request state: the request wrapper the server builds for
//! every call, and the streaming state tracker the Streaming Engine
//! maintains while relaying one in-flight response.

use serde::{Deserialize, Serialize};

use crate::ids::{CredentialId, RequestId};
use crate::messages::{CanonicalRequest, StopReason, TokenUsage, ToolCall};

/// Everything the server and router know about one inbound request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Unique ID for this request, propagated as `x-request-id`.
    pub request_id: RequestId,
    /// SHA-256 hash of the API key used to authenticate, for log correlation
    /// without persisting the raw key.
    pub api_key_hash: String,
    /// Client IP address, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Client `User-Agent` header, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Wall-clock start time (RFC 3339), for latency accounting.
    pub start_time: String,
    /// Credential IDs already tried and excluded during failover for this request.
    #[serde(default)]
    pub tried_credential_ids: Vec<CredentialId>,
    /// The canonical request body.
    pub request: CanonicalRequest,
}

impl RequestContext {
    /// Start a new request context for an incoming canonical request.
    #[must_use]
    pub fn new(api_key_hash: String, request: CanonicalRequest) -> Self {
        Self {
            request_id: RequestId::new(),
            api_key_hash,
            ip_address: None,
            user_agent: None,
            start_time: chrono::Utc::now().to_rfc3339(),
            tried_credential_ids: Vec::new(),
            request,
        }
    }

    /// Record that a credential has been tried and should be excluded from
    /// the next selection attempt within this request's retry loop.
    pub fn mark_tried(&mut self, credential_id: CredentialId) {
        if !self.tried_credential_ids.contains(&credential_id) {
            self.tried_credential_ids.push(credential_id);
        }
    }
}

/// Per-request streaming state maintained by the Streaming Engine.
///
/// Invariants (see the Streaming Engine's emission logic, which is the only
/// code that mutates this struct):
/// - A content block is open only between its `content_block_start` and the
///   matching `content_block_stop`.
/// - `block_index` is monotonically non-decreasing.
/// - Exactly one `message_start` precedes all block events, and exactly one
///   `message_stop` follows the last block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SseState {
    /// Vendor-assigned message ID, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Resolved model ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Input token count, reported at `message_start`.
    pub input_tokens: u64,
    /// Index of the currently (or most recently) open content block.
    pub block_index: u32,
    /// Whether a text block is currently open.
    pub text_block_started: bool,
    /// Accumulated text across all text deltas seen so far.
    pub full_text: String,
    /// Tool calls constructed so far, in order.
    pub tool_calls: Vec<ToolCall>,
    /// Cumulative usage, updated as `message_delta` events arrive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Stop reason, set once the final `message_delta` arrives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    /// Whether `message_stop` has been emitted.
    pub finished: bool,
}

impl SseState {
    /// Advance to the next block index and mark a text block as open.
    pub fn open_text_block(&mut self) {
        if self.block_index > 0 || self.text_block_started || !self.tool_calls.is_empty() {
            self.block_index += 1;
        }
        self.text_block_started = true;
    }

    /// Append a text delta to the open text block.
    pub fn append_text(&mut self, delta: &str) {
        self.full_text.push_str(delta);
    }

    /// Close the currently open text block.
    pub fn close_text_block(&mut self) {
        self.text_block_started = false;
    }

    /// Record a completed tool call and advance the block index.
    pub fn push_tool_call(&mut self, tool_call: ToolCall) {
        if self.block_index > 0 || self.text_block_started || !self.tool_calls.is_empty() {
            self.block_index += 1;
        }
        self.tool_calls.push(tool_call);
    }

    /// Mark the stream as finished with the given stop reason.
    pub fn finish(&mut self, stop_reason: StopReason) {
        self.stop_reason = Some(stop_reason);
        self.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn request_context_new_has_no_tried_credentials() {
        let ctx = RequestContext::new("hash123".into(), CanonicalRequest::default());
        assert!(ctx.tried_credential_ids.is_empty());
    }

    #[test]
    fn mark_tried_deduplicates() {
        let mut ctx = RequestContext::new("hash".into(), CanonicalRequest::default());
        let id = CredentialId::new();
        ctx.mark_tried(id.clone());
        ctx.mark_tried(id.clone());
        assert_eq!(ctx.tried_credential_ids.len(), 1);
    }

    #[test]
    fn sse_state_default_is_unfinished() {
        let state = SseState::default();
        assert!(!state.finished);
        assert_eq!(state.block_index, 0);
    }

    #[test]
    fn first_text_block_does_not_advance_index() {
        let mut state = SseState::default();
        state.open_text_block();
        assert_eq!(state.block_index, 0);
        assert!(state.text_block_started);
    }

    #[test]
    fn second_block_advances_index() {
        let mut state = SseState::default();
        state.open_text_block();
        state.close_text_block();
        state.push_tool_call(ToolCall {
            content_type: "tool_use".into(),
            id: "tc-1".into(),
            name: "bash".into(),
            arguments: Map::new(),
            thought_signature: None,
        });
        assert_eq!(state.block_index, 1);
        assert_eq!(state.tool_calls.len(), 1);
    }

    #[test]
    fn append_text_accumulates() {
        let mut state = SseState::default();
        state.append_text("hello ");
        state.append_text("world");
        assert_eq!(state.full_text, "hello world");
    }

    #[test]
    fn finish_sets_stop_reason_and_finished() {
        let mut state = SseState::default();
        state.finish(StopReason::EndTurn);
        assert!(state.finished);
        assert_eq!(state.stop_reason, Some(StopReason::EndTurn));
    }
}
