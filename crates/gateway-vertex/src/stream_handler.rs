//! SSE stream handler for Gemini responses.
//!
//! Processes streaming chunks from `streamGenerateContent` and converts them
//! to canonical [`StreamEvent`] values: thinking/text transitions, function
//! call extraction, safety blocks, and token usage.
//!
//! The Claude-on-Vertex path doesn't need a handler of its own — its SSE
//! shape is identical to direct Anthropic's, so [`crate::provider`] reuses
//! `gateway_anthropic::stream_handler::handle_sse_event` directly.

use std::collections::HashSet;

use serde_json::Map;

use gateway_core::content::AssistantContent;
use gateway_core::events::{AssistantMessage, StreamEvent};
use gateway_core::messages::{ProviderType, TokenUsage, ToolCall};

use crate::types::{GeminiPart, GeminiStreamChunk, HarmProbability, SafetyRating};

/// Mutable state accumulated across SSE events within a single Gemini stream.
#[derive(Default)]
pub struct StreamState {
    pub accumulated_text: String,
    pub accumulated_thinking: String,
    pub tool_calls: Vec<ToolCallState>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub text_started: bool,
    pub thinking_started: bool,
    pub tool_call_index: u32,
    pub unique_prefix: String,
    pub completed_tool_ids: HashSet<String>,
}

pub struct ToolCallState {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
    pub thought_signature: Option<String>,
}

/// Create a new stream state for processing a Gemini SSE stream.
#[must_use]
pub fn create_stream_state() -> StreamState {
    StreamState { unique_prefix: format!("{:08x}", rand_u32()), ..Default::default() }
}

fn rand_u32() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().subsec_nanos();
    nanos ^ 0x5DEE_CE1D
}

/// Process a single SSE data chunk from the Gemini stream.
#[must_use]
pub fn process_stream_chunk(chunk: &GeminiStreamChunk, state: &mut StreamState) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    if let Some(ref error) = chunk.error {
        events.push(StreamEvent::Error { error: format!("Gemini API error ({}): {}", error.code, error.message) });
        return events;
    }

    if let Some(ref usage) = chunk.usage_metadata {
        state.input_tokens = usage.prompt_token_count;
        state.output_tokens = usage.candidates_token_count;
    }

    let Some(candidate) = chunk.candidates.as_ref().and_then(|c| c.first()) else {
        return events;
    };

    if let Some(ref content) = candidate.content {
        for part in &content.parts {
            events.extend(process_part(part, state));
        }
    }

    if let Some(ref finish_reason) = candidate.finish_reason {
        events.extend(handle_finish(finish_reason, candidate.safety_ratings.as_deref(), state));
    }

    events
}

fn process_part(part: &GeminiPart, state: &mut StreamState) -> Vec<StreamEvent> {
    match part {
        GeminiPart::Text { text, thought, .. } => {
            if *thought == Some(true) { process_thinking_text(text, state) } else { process_regular_text(text, state) }
        }
        GeminiPart::FunctionCall { function_call, thought_signature } => {
            process_function_call(function_call, thought_signature.as_deref(), state)
        }
        GeminiPart::FunctionResponse { .. } | GeminiPart::InlineData { .. } => vec![],
    }
}

fn process_thinking_text(text: &str, state: &mut StreamState) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    if !state.thinking_started {
        events.push(StreamEvent::ThinkingStart);
        state.thinking_started = true;
    }
    state.accumulated_thinking.push_str(text);
    events.push(StreamEvent::ThinkingDelta { delta: text.to_string() });
    events
}

fn process_regular_text(text: &str, state: &mut StreamState) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    if state.thinking_started {
        events.push(StreamEvent::ThinkingEnd { thinking: state.accumulated_thinking.clone(), signature: None });
        state.thinking_started = false;
    }
    if !state.text_started {
        events.push(StreamEvent::TextStart);
        state.text_started = true;
    }
    state.accumulated_text.push_str(text);
    events.push(StreamEvent::TextDelta { delta: text.to_string() });
    events
}

fn process_function_call(fc: &crate::types::FunctionCallData, thought_signature: Option<&str>, state: &mut StreamState) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    let id = format!("call_{}_{}", state.unique_prefix, state.tool_call_index);
    state.tool_call_index += 1;

    let args_str = serde_json::to_string(&fc.args).unwrap_or_else(|_| "{}".into());
    let arguments: Map<String, serde_json::Value> = match &fc.args {
        serde_json::Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    events.push(StreamEvent::ToolCallStart { tool_call_id: id.clone(), name: fc.name.clone() });
    events.push(StreamEvent::ToolCallDelta { tool_call_id: id.clone(), arguments_delta: args_str });

    let tool_call = ToolCall {
        content_type: "tool_use".into(),
        id: id.clone(),
        name: fc.name.clone(),
        arguments: arguments.clone(),
        thought_signature: thought_signature.map(String::from),
    };
    events.push(StreamEvent::ToolCallEnd { tool_call });

    state.tool_calls.push(ToolCallState { id, name: fc.name.clone(), args: fc.args.clone(), thought_signature: thought_signature.map(String::from) });
    events
}

fn handle_finish(finish_reason: &str, safety_ratings: Option<&[SafetyRating]>, state: &mut StreamState) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    if state.thinking_started {
        events.push(StreamEvent::ThinkingEnd { thinking: state.accumulated_thinking.clone(), signature: None });
        state.thinking_started = false;
    }

    if finish_reason == "SAFETY" {
        if let Some(ratings) = safety_ratings {
            let blocked: Vec<String> = ratings
                .iter()
                .filter(|r| r.probability == HarmProbability::High || r.probability == HarmProbability::Medium)
                .map(|r| format!("{:?}", r.category))
                .collect();
            if !blocked.is_empty() {
                events.push(StreamEvent::SafetyBlock {
                    blocked_categories: blocked.clone(),
                    error: format!("Response blocked by safety filter: {}", blocked.join(", ")),
                });
            }
        }
    }

    if state.text_started {
        events.push(StreamEvent::TextEnd { text: state.accumulated_text.clone(), signature: None });
        state.text_started = false;
    }

    let mut content = Vec::new();
    if !state.accumulated_thinking.is_empty() {
        content.push(AssistantContent::Thinking { thinking: state.accumulated_thinking.clone(), signature: None });
    }
    if !state.accumulated_text.is_empty() {
        content.push(AssistantContent::text(&state.accumulated_text));
    }
    for tc in &state.tool_calls {
        let arguments: Map<String, serde_json::Value> = match &tc.args {
            serde_json::Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        content.push(AssistantContent::ToolUse { id: tc.id.clone(), name: tc.name.clone(), arguments, thought_signature: tc.thought_signature.clone() });
    }

    let stop_reason = map_google_stop_reason(finish_reason);

    events.push(StreamEvent::Done {
        message: AssistantMessage {
            content,
            token_usage: Some(TokenUsage {
                input_tokens: state.input_tokens,
                output_tokens: state.output_tokens,
                cache_read_tokens: None,
                cache_creation_tokens: None,
                cache_creation_5m_tokens: None,
                cache_creation_1h_tokens: None,
                provider_type: Some(ProviderType::Vertex),
            }),
        },
        stop_reason: stop_reason.into(),
    });

    events
}

/// Synthesize a done event when the stream ends without a finish reason.
#[must_use]
pub fn synthesize_done_event(state: &mut StreamState) -> Vec<StreamEvent> {
    let finish_reason = if state.tool_calls.is_empty() { "STOP" } else { "TOOL_USE" };
    handle_finish(finish_reason, None, state)
}

fn map_google_stop_reason(reason: &str) -> &'static str {
    match reason {
        "MAX_TOKENS" => "max_tokens",
        "TOOL_USE" => "tool_use",
        _ => "end_turn",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FunctionCallData, GeminiApiError, GeminiCandidate, GeminiCandidateContent, HarmCategory, UsageMetadata};

    fn empty_chunk() -> GeminiStreamChunk {
        GeminiStreamChunk::default()
    }

    #[test]
    fn initial_state_is_empty() {
        let state = create_stream_state();
        assert!(state.accumulated_text.is_empty());
        assert!(!state.unique_prefix.is_empty());
    }

    #[test]
    fn api_error_emits_error_event() {
        let chunk = GeminiStreamChunk { error: Some(GeminiApiError { code: 429, message: "Rate limit".into() }), ..empty_chunk() };
        let mut state = create_stream_state();
        let events = process_stream_chunk(&chunk, &mut state);
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Error { error } => assert!(error.contains("429") && error.contains("Rate limit")),
            _ => panic!("expected error event"),
        }
    }

    #[test]
    fn updates_token_usage() {
        let chunk = GeminiStreamChunk {
            usage_metadata: Some(UsageMetadata { prompt_token_count: 100, candidates_token_count: 50, total_token_count: 150 }),
            ..empty_chunk()
        };
        let mut state = create_stream_state();
        let _ = process_stream_chunk(&chunk, &mut state);
        assert_eq!(state.input_tokens, 100);
        assert_eq!(state.output_tokens, 50);
    }

    #[test]
    fn emits_text_start_on_first_text() {
        let chunk = GeminiStreamChunk {
            candidates: Some(vec![GeminiCandidate {
                content: Some(GeminiCandidateContent { parts: vec![GeminiPart::Text { text: "hello".into(), thought: None, thought_signature: None }], role: Some("model".into()) }),
                finish_reason: None,
                safety_ratings: None,
            }]),
            ..empty_chunk()
        };
        let mut state = create_stream_state();
        let events = process_stream_chunk(&chunk, &mut state);
        assert!(matches!(events[0], StreamEvent::TextStart));
        assert!(matches!(&events[1], StreamEvent::TextDelta { delta } if delta == "hello"));
    }

    #[test]
    fn thinking_to_text_transition_emits_thinking_end() {
        let chunk = GeminiStreamChunk {
            candidates: Some(vec![GeminiCandidate {
                content: Some(GeminiCandidateContent { parts: vec![GeminiPart::Text { text: "answer".into(), thought: None, thought_signature: None }], role: Some("model".into()) }),
                finish_reason: None,
                safety_ratings: None,
            }]),
            ..empty_chunk()
        };
        let mut state = create_stream_state();
        state.thinking_started = true;
        state.accumulated_thinking = "prior thinking".into();
        let events = process_stream_chunk(&chunk, &mut state);
        assert!(matches!(&events[0], StreamEvent::ThinkingEnd { thinking, .. } if thinking == "prior thinking"));
        assert!(matches!(events[1], StreamEvent::TextStart));
    }

    #[test]
    fn emits_toolcall_events_for_function_call() {
        let chunk = GeminiStreamChunk {
            candidates: Some(vec![GeminiCandidate {
                content: Some(GeminiCandidateContent {
                    parts: vec![GeminiPart::FunctionCall { function_call: FunctionCallData { name: "bash".into(), args: serde_json::json!({"command": "ls"}) }, thought_signature: Some("sig-123".into()) }],
                    role: Some("model".into()),
                }),
                finish_reason: None,
                safety_ratings: None,
            }]),
            ..empty_chunk()
        };
        let mut state = create_stream_state();
        let events = process_stream_chunk(&chunk, &mut state);
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[2], StreamEvent::ToolCallEnd { tool_call } if tool_call.thought_signature.as_deref() == Some("sig-123")));
    }

    #[test]
    fn finish_safety_emits_safety_block() {
        let chunk = GeminiStreamChunk {
            candidates: Some(vec![GeminiCandidate {
                content: None,
                finish_reason: Some("SAFETY".into()),
                safety_ratings: Some(vec![SafetyRating { category: HarmCategory::Harassment, probability: HarmProbability::High }]),
            }]),
            ..empty_chunk()
        };
        let mut state = create_stream_state();
        let events = process_stream_chunk(&chunk, &mut state);
        assert!(events.iter().any(|e| matches!(e, StreamEvent::SafetyBlock { .. })));
    }

    #[test]
    fn done_includes_thinking_and_text_and_provider_type() {
        let mut state = create_stream_state();
        state.accumulated_thinking = "thought".into();
        state.accumulated_text = "answer".into();
        state.text_started = true;
        let events = handle_finish("STOP", None, &mut state);
        match events.last().unwrap() {
            StreamEvent::Done { message, .. } => {
                assert_eq!(message.content.len(), 2);
                assert_eq!(message.token_usage.as_ref().unwrap().provider_type, Some(ProviderType::Vertex));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn synthesize_uses_tool_use_when_tools_present() {
        let mut state = create_stream_state();
        state.tool_calls.push(ToolCallState { id: "call_1".into(), name: "test".into(), args: serde_json::json!({}), thought_signature: None });
        let events = synthesize_done_event(&mut state);
        match events.last().unwrap() {
            StreamEvent::Done { stop_reason, .. } => assert_eq!(stop_reason, "tool_use"),
            _ => panic!("expected done"),
        }
    }

    #[test]
    fn stop_reason_mapping() {
        assert_eq!(map_google_stop_reason("STOP"), "end_turn");
        assert_eq!(map_google_stop_reason("MAX_TOKENS"), "max_tokens");
        assert_eq!(map_google_stop_reason("TOOL_USE"), "tool_use");
    }
}
